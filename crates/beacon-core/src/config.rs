//! beacon.toml configuration parser.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::is_valid_id;

/// Errors raised while loading or validating `beacon.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration { field: String, value: String },

    #[error("invalid service id: {0:?}")]
    InvalidServiceId(String),

    #[error("duplicate service id: {0}")]
    DuplicateService(String),

    #[error("service {service}: {reason}")]
    InvalidCheck { service: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_timeout")]
    pub default_timeout: String,
    pub check_timeout: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            default_timeout: default_timeout(),
            check_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub check: Option<CheckConfig>,
}

/// How a service is probed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckConfig {
    Http {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        timeout: Option<String>,
        latency_threshold: Option<String>,
    },
    Database {
        #[serde(default = "default_database_bond")]
        bond: String,
        timeout: Option<String>,
        latency_threshold: Option<String>,
    },
    Cache {
        #[serde(default = "default_cache_bond")]
        bond: String,
        timeout: Option<String>,
        latency_threshold: Option<String>,
    },
    Bond {
        bond: String,
        timeout: Option<String>,
    },
}

impl CheckConfig {
    /// Per-check timeout override, if configured.
    pub fn timeout(&self) -> Result<Option<Duration>, ConfigError> {
        let raw = match self {
            CheckConfig::Http { timeout, .. }
            | CheckConfig::Database { timeout, .. }
            | CheckConfig::Cache { timeout, .. }
            | CheckConfig::Bond { timeout, .. } => timeout,
        };
        optional_duration("check.timeout", raw.as_deref())
    }

    /// Latency threshold above which a healthy probe is degraded.
    pub fn latency_threshold(&self) -> Result<Option<Duration>, ConfigError> {
        let raw = match self {
            CheckConfig::Http {
                latency_threshold, ..
            }
            | CheckConfig::Database {
                latency_threshold, ..
            }
            | CheckConfig::Cache {
                latency_threshold, ..
            } => latency_threshold.as_deref(),
            CheckConfig::Bond { .. } => None,
        };
        optional_duration("check.latency_threshold", raw)
    }
}

impl BeaconConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate a config document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: BeaconConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.interval()?;
        self.default_timeout()?;
        self.check_timeout()?;

        let mut seen = HashSet::new();
        for svc in &self.services {
            if !is_valid_id(&svc.id) {
                return Err(ConfigError::InvalidServiceId(svc.id.clone()));
            }
            if !seen.insert(svc.id.as_str()) {
                return Err(ConfigError::DuplicateService(svc.id.clone()));
            }
            if let Some(check) = &svc.check {
                check.timeout()?;
                check.latency_threshold()?;
                if let CheckConfig::Http { url, method, .. } = check {
                    if !url.starts_with("http://") {
                        return Err(ConfigError::InvalidCheck {
                            service: svc.id.clone(),
                            reason: format!("unsupported url {url:?} (expected http://)"),
                        });
                    }
                    if !matches!(method.to_ascii_uppercase().as_str(), "GET" | "HEAD") {
                        return Err(ConfigError::InvalidCheck {
                            service: svc.id.clone(),
                            reason: format!("unsupported method {method:?}"),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Period of the background run loop.
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        required_duration("monitor.interval", &self.monitor.interval)
    }

    /// Engine-wide default probe timeout.
    pub fn default_timeout(&self) -> Result<Duration, ConfigError> {
        required_duration("monitor.default_timeout", &self.monitor.default_timeout)
    }

    /// Per-call timeout cap applied to every run.
    pub fn check_timeout(&self) -> Result<Option<Duration>, ConfigError> {
        optional_duration("monitor.check_timeout", self.monitor.check_timeout.as_deref())
    }
}

/// Parse a duration string like "500ms", "5s", "1m", "2h", "7d".
/// A bare number is taken as seconds. Values that overflow are rejected.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        scaled_secs(secs, 1)
    } else if let Some(mins) = s.strip_suffix('m') {
        scaled_secs(mins, 60)
    } else if let Some(hours) = s.strip_suffix('h') {
        scaled_secs(hours, 3600)
    } else if let Some(days) = s.strip_suffix('d') {
        scaled_secs(days, 86_400)
    } else {
        scaled_secs(s, 1)
    }
}

fn scaled_secs(value: &str, unit: u64) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()?
        .checked_mul(unit)
        .map(Duration::from_secs)
}

fn required_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    match parse_duration(value) {
        Some(d) if !d.is_zero() => Ok(d),
        _ => Err(ConfigError::InvalidDuration {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

fn optional_duration(field: &str, value: Option<&str>) -> Result<Option<Duration>, ConfigError> {
    value.map(|v| required_duration(field, v)).transpose()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/beacon")
}

fn default_interval() -> String {
    "30s".to_string()
}

fn default_timeout() -> String {
    "5s".to_string()
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_database_bond() -> String {
    "database".to_string()
}

fn default_cache_bond() -> String {
    "cache".to_string()
}
