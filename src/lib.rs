pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{cli::LocalStorage, toml_config::TomlConfig};

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::{DriverLoop, OfferPolicy};
pub use core::{board::OrderBoard, fare::quote, fare::FareSchedule, session::DriverSession};
pub use utils::error::{CourierError, Result};
