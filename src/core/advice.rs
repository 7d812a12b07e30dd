use crate::domain::model::DriverStats;
use crate::domain::ports::{AdviceProvider, PlaceLink, PlacesResponse};
use crate::utils::error::{CourierError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

pub const NO_KEY_ADVICE: &str = "Set an API key to receive personalised advice.";
pub const EMPTY_ADVICE: &str = "Keep up the good work! Keep your rates high.";
pub const FALLBACK_ADVICE: &str =
    "Tip of the day: keep the app updated and be friendly with customers!";
pub const NO_KEY_PLACES: &str = "API key not configured. Check your settings.";
pub const EMPTY_PLACES: &str = "No results found for this search.";
pub const FALLBACK_PLACES: &str =
    "Sorry, something went wrong while searching the map. Try again later.";

/// Speech comes back as raw 16-bit little-endian mono PCM at this rate.
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdviceConfig {
    pub endpoint: String,
    pub model: String,
    pub speech_model: String,
    pub voice: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for AdviceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            speech_model: "gemini-2.5-flash-preview-tts".to_string(),
            voice: "Kore".to_string(),
            api_key: None,
            timeout_seconds: 20,
        }
    }
}

impl AdviceConfig {
    /// 空字串或未替換的 `${VAR}` 視為沒有金鑰
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && !k.starts_with("${"))
    }
}

/// Coaching and place search backed by a `generateContent` JSON API.
pub struct GenerativeAdvisor {
    client: Client,
    config: AdviceConfig,
}

impl GenerativeAdvisor {
    pub fn new(config: AdviceConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    fn url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            model
        )
    }

    async fn generate(&self, api_key: &str, body: Value) -> Result<Value> {
        self.generate_with(&self.config.model, api_key, body).await
    }

    async fn generate_with(&self, model: &str, api_key: &str, body: Value) -> Result<Value> {
        let url = self.url(model);
        tracing::debug!("Making generateContent request to: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        tracing::debug!("API response status: {}", response.status());
        if !response.status().is_success() {
            return Err(CourierError::ApiStatusError {
                status: response.status().as_u16(),
            });
        }

        Ok(response.json().await?)
    }
}

pub fn advice_prompt(stats: &DriverStats) -> String {
    format!(
        "You are an expert coach for app delivery drivers.\n\
         Look at this driver's data and give short, motivating and practical advice \
         (at most 3 sentences) on how to level up or keep the account healthy.\n\
         Be direct and use emojis. Answer in Brazilian Portuguese.\n\n\
         Data:\n\
         Level: {}\n\
         Score: {} (out of 1000)\n\
         Acceptance rate: {}%\n\
         Cancellation rate: {}%\n\
         Rating: {}\n\
         Total deliveries: {}",
        stats.level,
        stats.score,
        stats.acceptance_rate,
        stats.cancellation_rate,
        stats.customer_rating,
        stats.total_deliveries
    )
}

/// Concatenated text parts of the first candidate.
pub fn extract_text(response: &Value) -> Option<String> {
    let parts = response
        .pointer("/candidates/0/content/parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

pub fn extract_links(response: &Value) -> Vec<PlaceLink> {
    let Some(chunks) = response
        .pointer("/candidates/0/groundingMetadata/groundingChunks")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    chunks
        .iter()
        .filter_map(|chunk| chunk.get("maps").or_else(|| chunk.get("web")))
        .filter_map(|source| {
            Some(PlaceLink {
                uri: source.get("uri")?.as_str()?.to_string(),
                title: source
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

/// Decoded PCM of the first inline audio part.
pub fn extract_audio(response: &Value) -> Result<Option<Vec<u8>>> {
    let Some(data) = response
        .pointer("/candidates/0/content/parts/0/inlineData/data")
        .and_then(Value::as_str)
    else {
        return Ok(None);
    };
    let pcm = BASE64
        .decode(data)
        .map_err(|e| CourierError::validation(format!("invalid audio payload: {}", e)))?;
    Ok((!pcm.is_empty()).then_some(pcm))
}

/// Wraps 16-bit mono PCM in a minimal RIFF/WAVE container.
pub fn pcm_to_wav(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    const CHANNELS: u16 = 1;
    const BITS_PER_SAMPLE: u16 = 16;
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate * block_align as u32;
    let data_len = pcm.len() as u32;

    let mut wav = Vec::with_capacity(44 + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&CHANNELS.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}

#[async_trait]
impl AdviceProvider for GenerativeAdvisor {
    async fn driver_advice(&self, stats: &DriverStats) -> String {
        let Some(api_key) = self.config.api_key() else {
            return NO_KEY_ADVICE.to_string();
        };

        let body = json!({
            "contents": [{ "parts": [{ "text": advice_prompt(stats) }] }]
        });

        match self.generate(api_key, body).await {
            Ok(response) => extract_text(&response).unwrap_or_else(|| EMPTY_ADVICE.to_string()),
            Err(e) => {
                tracing::error!("❌ Advice request failed: {}", e);
                FALLBACK_ADVICE.to_string()
            }
        }
    }

    async fn nearby_places(&self, query: &str, lat: f64, lng: f64) -> PlacesResponse {
        let Some(api_key) = self.config.api_key() else {
            return PlacesResponse {
                text: NO_KEY_PLACES.to_string(),
                links: Vec::new(),
            };
        };

        let prompt = format!(
            "You are a helpful assistant for delivery drivers. The user asked: \"{}\". \
             Suggest relevant places near the given location. Be brief and focus on what \
             matters to someone driving (distance, whether it is open, rating).",
            query
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "tools": [{ "googleMaps": {} }],
            "toolConfig": {
                "retrievalConfig": { "latLng": { "latitude": lat, "longitude": lng } }
            }
        });

        match self.generate(api_key, body).await {
            Ok(response) => PlacesResponse {
                text: extract_text(&response).unwrap_or_else(|| EMPTY_PLACES.to_string()),
                links: extract_links(&response),
            },
            Err(e) => {
                tracing::error!("❌ Place search failed: {}", e);
                PlacesResponse {
                    text: FALLBACK_PLACES.to_string(),
                    links: Vec::new(),
                }
            }
        }
    }

    async fn generate_speech(&self, text: &str) -> Option<Vec<u8>> {
        let Some(api_key) = self.config.api_key() else {
            tracing::warn!("⚠️ API key missing, skipping speech");
            return None;
        };

        let body = json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": self.config.voice } }
                }
            }
        });

        let response = self
            .generate_with(&self.config.speech_model, api_key, body)
            .await
            .and_then(|response| extract_audio(&response));
        match response {
            Ok(Some(pcm)) => Some(pcm_to_wav(&pcm, SPEECH_SAMPLE_RATE)),
            Ok(None) => {
                tracing::warn!("⚠️ Speech response carried no audio");
                None
            }
            Err(e) => {
                tracing::error!("❌ Speech request failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_key_counts_as_missing() {
        let mut config = AdviceConfig::default();
        assert_eq!(config.api_key(), None);

        config.api_key = Some("${GEMINI_API_KEY}".to_string());
        assert_eq!(config.api_key(), None);

        config.api_key = Some(" abc ".to_string());
        assert_eq!(config.api_key(), Some("abc"));
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Keep " }, { "text": "going 🚀" }] } }]
        });
        assert_eq!(extract_text(&response).as_deref(), Some("Keep going 🚀"));
        assert_eq!(extract_text(&json!({ "candidates": [] })), None);
    }

    #[test]
    fn test_extract_links_prefers_maps_chunks() {
        let response = json!({
            "candidates": [{
                "groundingMetadata": { "groundingChunks": [
                    { "maps": { "uri": "https://maps.example/1", "title": "Posto Shell" } },
                    { "web": { "uri": "https://web.example/2" } },
                    { "other": {} }
                ]}
            }]
        });

        let links = extract_links(&response);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].title, "Posto Shell");
        assert_eq!(links[1].title, "");
    }

    #[test]
    fn test_prompt_carries_stats() {
        let prompt = advice_prompt(&DriverStats::default());
        assert!(prompt.contains("Level: Gold"));
        assert!(prompt.contains("Score: 850"));
    }

    #[test]
    fn test_wav_header_describes_pcm() {
        let wav = pcm_to_wav(&[1, 0, 2, 0], SPEECH_SAMPLE_RATE);

        assert_eq!(wav.len(), 48);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 40);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 24_000);
        assert_eq!(u32::from_le_bytes(wav[28..32].try_into().unwrap()), 48_000);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(&wav[44..], &[1, 0, 2, 0]);
    }

    #[test]
    fn test_extract_audio() {
        let response = json!({
            "candidates": [{ "content": { "parts": [{ "inlineData": { "data": "AQACAA==" } }] } }]
        });
        assert_eq!(extract_audio(&response).unwrap(), Some(vec![1, 0, 2, 0]));
        assert_eq!(extract_audio(&json!({})).unwrap(), None);

        let broken = json!({
            "candidates": [{ "content": { "parts": [{ "inlineData": { "data": "!!" } }] } }]
        });
        assert!(extract_audio(&broken).is_err());
    }

    #[tokio::test]
    async fn test_missing_key_skips_network() {
        let advisor = GenerativeAdvisor::new(AdviceConfig::default());
        assert_eq!(
            advisor.driver_advice(&DriverStats::default()).await,
            NO_KEY_ADVICE
        );
        let places = advisor.nearby_places("gas station", -23.56, -46.65).await;
        assert_eq!(places.text, NO_KEY_PLACES);
        assert!(places.links.is_empty());
        assert_eq!(advisor.generate_speech("Olá").await, None);
    }
}
