use crate::core::advice::AdviceConfig;
use crate::core::fare::FareSchedule;
use crate::core::session::Timings;
use crate::core::ConfigProvider;
use crate::utils::error::{CourierError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_range, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub storage: StorageConfig,
    pub store: StoreProfile,
    pub fares: FareSchedule,
    pub driver: DriverConfig,
    pub advice: AdviceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./courier-data".to_string(),
        }
    }
}

/// 商家資料 (dispatch 時帶入訂單)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreProfile {
    pub name: String,
    pub address: String,
}

impl Default for StoreProfile {
    fn default() -> Self {
        Self {
            name: "My Store".to_string(),
            address: "Rua do Comércio, 123 - Centro".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub offer_seconds: u64,
    pub accept_delay_ms: u64,
    pub completion_display_seconds: u64,
    pub arrival_minutes: u64,
    pub poll_interval_ms: u64,
    pub generate_after_seconds: u64,
    pub step_delay_seconds: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            offer_seconds: 15,
            accept_delay_ms: 1500,
            completion_display_seconds: 4,
            arrival_minutes: 11,
            poll_interval_ms: 1000,
            generate_after_seconds: 4,
            step_delay_seconds: 2,
        }
    }
}

impl DriverConfig {
    pub fn timings(&self) -> Timings {
        Timings {
            offer_window: Duration::from_secs(self.offer_seconds),
            accept_delay: Duration::from_millis(self.accept_delay_ms),
            completion_display: Duration::from_secs(self.completion_display_seconds),
            arrival_window: Duration::from_secs(self.arrival_minutes.saturating_mul(60)),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            generate_after: Duration::from_secs(self.generate_after_seconds),
            step_delay: Duration::from_secs(self.step_delay_seconds),
        }
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CourierError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 檔案不存在時使用預設值
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) if p.as_ref().exists() => Self::from_file(p),
            Some(p) => Err(CourierError::ConfigError {
                message: format!("config file not found: {}", p.as_ref().display()),
            }),
            None => Ok(Self::default()),
        }
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| CourierError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GEMINI_API_KEY})；未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| CourierError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_path("storage.data_dir", &self.storage.data_dir)?;
        self.fares.validate()?;

        validate_range("driver.offer_seconds", self.driver.offer_seconds, 1, 600)?;
        validate_range("driver.poll_interval_ms", self.driver.poll_interval_ms, 10, 60_000)?;
        validate_range("driver.accept_delay_ms", self.driver.accept_delay_ms, 0, 60_000)?;
        validate_range(
            "driver.completion_display_seconds",
            self.driver.completion_display_seconds,
            0,
            600,
        )?;
        validate_range("driver.arrival_minutes", self.driver.arrival_minutes, 1, 240)?;
        validate_range(
            "driver.generate_after_seconds",
            self.driver.generate_after_seconds,
            0,
            3600,
        )?;
        validate_range("driver.step_delay_seconds", self.driver.step_delay_seconds, 0, 3600)?;

        validate_non_empty_string("store.name", &self.store.name)?;
        validate_non_empty_string("store.address", &self.store.address)?;

        validate_url("advice.endpoint", &self.advice.endpoint)?;
        if self.advice.model.trim().is_empty() {
            return Err(CourierError::MissingConfigError {
                field: "advice.model".to_string(),
            });
        }
        validate_non_empty_string("advice.speech_model", &self.advice.speech_model)?;
        validate_non_empty_string("advice.voice", &self.advice.voice)?;

        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn data_dir(&self) -> &str {
        &self.storage.data_dir
    }

    fn fare_schedule(&self) -> &FareSchedule {
        &self.fares
    }

    fn timings(&self) -> Timings {
        self.driver.timings()
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();

        assert_eq!(config.fares, FareSchedule::default());
        assert_eq!(config.timings(), Timings::default());
        assert_eq!(config.data_dir(), "./courier-data");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_fare_override() {
        let toml_content = r#"
[fares]
rate_per_km = 1.50
machine_bonus = 3.0

[driver]
offer_seconds = 30
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.fares.rate_per_km, 1.50);
        assert_eq!(config.fares.machine_bonus, 3.0);
        assert_eq!(config.fares.single_min_fee, 6.90);
        assert_eq!(config.timings().offer_window, Duration::from_secs(30));
        assert_eq!(config.timings().accept_delay, Duration::from_millis(1500));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("COURIER_TEST_DATA_DIR", "/tmp/courier-test");

        let toml_content = r#"
[storage]
data_dir = "${COURIER_TEST_DATA_DIR}"

[advice]
api_key = "${COURIER_TEST_UNSET_KEY}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.storage.data_dir, "/tmp/courier-test");
        assert_eq!(config.advice.api_key(), None);

        std::env::remove_var("COURIER_TEST_DATA_DIR");
    }

    #[test]
    fn test_config_validation() {
        let config = TomlConfig::from_toml_str(
            r#"
[fares]
rate_per_km = -1.0
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = TomlConfig::from_toml_str(
            r#"
[advice]
endpoint = "not-a-url"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_driver_timers_are_range_checked() {
        let config = TomlConfig::from_toml_str(
            r#"
[driver]
arrival_minutes = 9223372036854775807
"#,
        )
        .unwrap();
        assert_eq!(config.timings().arrival_window, Duration::from_secs(u64::MAX));
        assert!(config.validate().is_err());

        for field in [
            "completion_display_seconds",
            "generate_after_seconds",
            "step_delay_seconds",
        ] {
            let config =
                TomlConfig::from_toml_str(&format!("[driver]\n{} = 999999\n", field)).unwrap();
            assert!(config.validate().is_err(), "{} should be rejected", field);
        }
    }

    #[test]
    fn test_blank_store_profile_is_rejected() {
        let config = TomlConfig::from_toml_str(
            r#"
[store]
name = "   "
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[store]
name = "Sushi House"
address = "Rua Augusta, 500"
"#;
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.store.name, "Sushi House");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(TomlConfig::load_or_default(Some("/definitely/not/here.toml")).is_err());
        assert!(TomlConfig::load_or_default(None::<&str>).is_ok());
    }
}
