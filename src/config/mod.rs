use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use serde::Serialize;

use crate::device::{DeviceProfile, DEFAULT_LAMP_HOURS_EVERY, DEFAULT_POLL_INTERVAL};

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_BRAND: &str = "benq";
pub const DEFAULT_MODEL: &str = "tk700";
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";
pub const DEFAULT_LOG_RETENTION_DAYS: usize = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid LOG_LEVEL value {0:?}! It must be one of: off, error, warn, info, debug, trace")]
    InvalidLogLevel(String),

    #[error("Projector brand {0:?} is not supported")]
    UnsupportedBrand(String),

    #[error("Projector model {model:?} is not supported for brand {brand:?}")]
    UnsupportedModel { brand: String, model: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("Invalid {name} value {value:?}! It must be a whole number greater than or equal to 1")]
    InvalidNumber { name: &'static str, value: String },

    #[error("Invalid PROJECTOR_NAME value {0:?}! Only A-Z, a-z, 0-9, _ and - are allowed")]
    InvalidName(String),

    #[error("{0} log path does not exist! Please create one.")]
    MissingLogPath(String),
}

/// Process configuration, read from environment variables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    #[serde(serialize_with = "serialize_level")]
    pub log_level: LevelFilter,
    /// Directory for the daily rotated `activity.log`; console only when unset.
    pub log_path: Option<PathBuf>,
    pub log_retention_days: usize,
    pub projector_brand: String,
    pub projector_model: String,
    pub projector_port: String,
    pub cooldown_minutes: u64,
    pub projector_name: String,
    pub poll_interval_secs: u64,
    pub lamp_hours_every: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let level = get("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let log_level = LevelFilter::from_str(&level).map_err(|_| ConfigError::InvalidLogLevel(level.clone()))?;

        let log_path = match get("LOG_PATH") {
            Some(path) if Path::new(&path).is_dir() => Some(PathBuf::from(path)),
            Some(path) => return Err(ConfigError::MissingLogPath(path)),
            None => None,
        };

        let log_retention_days = match get("LOG_RETENTION_DAYS") {
            Some(value) => {
                let days = parse_positive("LOG_RETENTION_DAYS", &value)?;
                usize::try_from(days).map_err(|_| ConfigError::InvalidNumber {
                    name: "LOG_RETENTION_DAYS",
                    value,
                })?
            }
            None => DEFAULT_LOG_RETENTION_DAYS,
        };

        let projector_brand = get("PROJECTOR_BRAND").unwrap_or_else(|| DEFAULT_BRAND.to_string()).to_lowercase();
        if !DeviceProfile::supports_brand(&projector_brand) {
            return Err(ConfigError::UnsupportedBrand(projector_brand));
        }

        let projector_model = get("PROJECTOR_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()).to_lowercase();
        let profile = DeviceProfile::lookup(&projector_brand, &projector_model).ok_or_else(|| {
            ConfigError::UnsupportedModel {
                brand: projector_brand.clone(),
                model: projector_model.clone(),
            }
        })?;

        let projector_port = get("PROJECTOR_PORT").unwrap_or_else(|| DEFAULT_PORT.to_string());

        let cooldown_minutes = match get("PROJECTOR_COOLDOWN_MINUTES") {
            Some(value) => {
                let minutes = parse_positive("PROJECTOR_COOLDOWN_MINUTES", &value)?;
                if minutes.checked_mul(60).is_none() {
                    return Err(ConfigError::InvalidNumber {
                        name: "PROJECTOR_COOLDOWN_MINUTES",
                        value,
                    });
                }
                minutes
            }
            None => profile.cooldown.as_secs() / 60,
        };

        let projector_name = get("PROJECTOR_NAME").ok_or(ConfigError::Empty("PROJECTOR_NAME"))?;
        if !is_valid_name(&projector_name) {
            return Err(ConfigError::InvalidName(projector_name));
        }

        let poll_interval_secs = match get("POLL_INTERVAL_SECONDS") {
            Some(value) => parse_positive("POLL_INTERVAL_SECONDS", &value)?,
            None => DEFAULT_POLL_INTERVAL.as_secs(),
        };

        let lamp_hours_every = match get("LAMP_HOURS_EVERY") {
            Some(value) => {
                let every = parse_positive("LAMP_HOURS_EVERY", &value)?;
                u32::try_from(every).map_err(|_| ConfigError::InvalidNumber {
                    name: "LAMP_HOURS_EVERY",
                    value,
                })?
            }
            None => DEFAULT_LAMP_HOURS_EVERY,
        };

        Ok(Self {
            log_level,
            log_path,
            log_retention_days,
            projector_brand,
            projector_model,
            projector_port,
            cooldown_minutes,
            projector_name,
            poll_interval_secs,
            lamp_hours_every,
        })
    }

    /// The configured device profile with the configured cooldown applied.
    pub fn profile(&self) -> Option<DeviceProfile> {
        DeviceProfile::lookup(&self.projector_brand, &self.projector_model)
            .map(|p| p.with_cooldown(Duration::from_secs(self.cooldown_minutes.saturating_mul(60))))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn parse_positive(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            name,
            value: value.to_string(),
        }),
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn serialize_level<S: serde::Serializer>(level: &LevelFilter, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(level.as_str())
}
