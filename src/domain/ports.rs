use crate::core::fare::FareSchedule;
use crate::core::session::Timings;
use crate::domain::model::DriverStats;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Key/value byte store shared between the store and driver sides.
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// 不存在時回傳 `Ok(false)`
    fn remove_file(&self, path: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn data_dir(&self) -> &str;
    fn fare_schedule(&self) -> &FareSchedule;
    fn timings(&self) -> Timings;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceLink {
    pub uri: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacesResponse {
    pub text: String,
    pub links: Vec<PlaceLink>,
}

/// Generative coaching, place search and speech. Implementations never
/// fail: errors turn into fallback text or `None`.
#[async_trait]
pub trait AdviceProvider: Send + Sync {
    async fn driver_advice(&self, stats: &DriverStats) -> String;
    async fn nearby_places(&self, query: &str, lat: f64, lng: f64) -> PlacesResponse;
    /// WAV audio reading `text` aloud, or `None` when speech is unavailable.
    async fn generate_speech(&self, text: &str) -> Option<Vec<u8>>;
}
