pub mod advice;
pub mod board;
pub mod dispatch;
pub mod fare;
pub mod generator;
pub mod lifecycle;
pub mod session;
pub mod tracking;
pub mod wallet;

pub use crate::domain::model::{FareBreakdown, Order, PaymentMethod, RouteType, Transaction};
pub use crate::domain::ports::{AdviceProvider, ConfigProvider, Storage};
pub use crate::utils::error::Result;
