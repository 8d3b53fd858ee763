use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use thiserror::Error;

use crate::core_types::Principal;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default)]
    pub use_json: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "./logs".to_string()
}

fn default_log_file() -> String {
    "event_hub.log".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    /// 0 binds an ephemeral port
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
        }
    }
}

/// Event hub tuning for emitter nodes.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HubConfig {
    /// How long a batch stays open before it is sealed
    pub batch_making_duration_ms: u64,
    /// Byte threshold that seals a batch early
    pub batch_max_size_bytes: usize,
    /// Delivery loop period
    pub heartbeat_interval_ms: u64,
    /// Per-callback HTTP timeout
    pub delivery_timeout_ms: u64,
    /// Principals allowed to manage listeners on behalf of others
    pub admins: Vec<Principal>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            batch_making_duration_ms: 1_000,
            batch_max_size_bytes: 500 * 1024,
            heartbeat_interval_ms: 100,
            delivery_timeout_ms: 5_000,
            admins: Vec::new(),
        }
    }
}

impl HubConfig {
    pub fn batch_making_duration(&self) -> Duration {
        Duration::from_millis(self.batch_making_duration_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    /// Accepted clock skew for signed requests
    pub time_window_ms: i64,
    pub max_body_bytes: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            time_window_ms: 30_000,
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Emitter a listener node subscribes to
    pub emitter_url: Option<String>,
    /// Hex seed of the node identity; a fresh one is generated when absent
    pub identity_seed: Option<String>,
    /// Public URL the node advertises for callbacks, defaults to its bound address
    pub public_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            log_file: default_log_file(),
            use_json: false,
            rotation: default_rotation(),
            gateway: GatewayConfig::default(),
            hub: HubConfig::default(),
            auth: AuthConfig::default(),
            service: ServiceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load `config/{env}.yaml`.
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Identity;

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config = AppConfig::from_yaml("log_level: debug\n").unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.hub.batch_max_size_bytes, 500 * 1024);
        assert_eq!(config.auth.time_window_ms, 30_000);
        assert!(config.service.emitter_url.is_none());
    }

    #[test]
    fn test_full_yaml() {
        let admin = Identity::generate().principal();
        let yaml = format!(
            r#"
log_level: info
log_dir: ./logs
log_file: node.log
use_json: true
rotation: hourly
gateway:
  host: 0.0.0.0
  port: 8080
hub:
  batch_making_duration_ms: 250
  batch_max_size_bytes: 1024
  admins: ["{admin}"]
service:
  emitter_url: http://127.0.0.1:8080
"#
        );

        let config = AppConfig::from_yaml(&yaml).unwrap();
        assert!(config.use_json);
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.hub.batch_making_duration(), Duration::from_millis(250));
        assert_eq!(config.hub.batch_max_size_bytes, 1024);
        assert_eq!(config.hub.heartbeat_interval_ms, 100, "unset field keeps default");
        assert_eq!(config.hub.admins, vec![admin]);
        assert_eq!(
            config.service.emitter_url.as_deref(),
            Some("http://127.0.0.1:8080")
        );
    }

    #[test]
    fn test_invalid_admin_rejected() {
        let err = AppConfig::from_yaml("hub:\n  admins: [\"nope\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load("no-such-env").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_dev_config_parses() {
        let content = include_str!("../config/dev.yaml");
        assert!(AppConfig::from_yaml(content).is_ok());
    }
}
