//! Configuration for the console client
use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{
    ApiPaths, Credentials, DEFAULT_LOGIN_TEST_PATH, DEFAULT_VALIDATION_PATH, HttpSettings,
};
use crate::datetime::{DateTimeContext, Timezone};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_validation_path")]
    pub validation_path: String,
    #[serde(default = "default_login_test_path")]
    pub login_test_path: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_validation_path() -> String {
    DEFAULT_VALIDATION_PATH.to_string()
}

fn default_login_test_path() -> String {
    DEFAULT_LOGIN_TEST_PATH.to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9000".to_string(),
            validation_path: default_validation_path(),
            login_test_path: default_login_test_path(),
            username: None,
            password: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Timezones used when showing and interpreting timestamps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// "UTC", "local" or an offset such as "-06:00"
    pub user_timezone: String,
    pub browser_timezone: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            user_timezone: "local".to_string(),
            browser_timezone: "local".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging format: "json" or "text"
    pub format: String,
    /// Default log level if no RUST_LOG is set
    pub default_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            default_level: "warn".to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api: ApiConfig,
    pub time: TimeConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults, an optional TOML file and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv().ok();

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(config_path) = std::env::var_os("LUMBERJACK_CONFIG") {
            let path = Path::new(&config_path);
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            } else {
                return Err(ConfigError::LoadError(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
        }

        Self::from_figment(figment.merge(Env::prefixed("LUMBERJACK_").split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::LoadError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::MissingConfig("API base URL is required".to_string()));
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(format!(
                "API base URL must be http(s): {}",
                self.api.base_url
            )));
        }
        if self.api.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "API timeout must be at least one second".to_string(),
            ));
        }
        self.date_time_context()?;
        Ok(())
    }

    pub fn date_time_context(&self) -> Result<DateTimeContext, ConfigError> {
        let parse = |value: &str| {
            value
                .parse::<Timezone>()
                .map_err(|e| ConfigError::InvalidValue(e.to_string()))
        };
        Ok(DateTimeContext::new(parse(&self.time.user_timezone)?)
            .with_browser_timezone(parse(&self.time.browser_timezone)?))
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            base_url: self.api.base_url.clone(),
            credentials: self.api.username.as_ref().map(|username| Credentials {
                username: username.clone(),
                password: self.api.password.clone(),
            }),
            timeout: Duration::from_secs(self.api.timeout_seconds),
        }
    }

    pub fn api_paths(&self) -> ApiPaths {
        ApiPaths {
            validation: self.api.validation_path.clone(),
            login_test: self.api.login_test_path.clone(),
        }
    }
}
