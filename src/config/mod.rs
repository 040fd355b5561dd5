//! Configuration module

use std::time::Duration;

use serde::Deserialize;

use crate::models::Credentials;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cleanpay: CleanPayConfig,
    /// Entries set up at start, in addition to those created through the API
    #[serde(default)]
    pub entries: Vec<Credentials>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleanPayConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,
}

impl Default for CleanPayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            update_interval_secs: default_update_interval_secs(),
        }
    }
}

impl CleanPayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs.max(1))
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8123
}

fn default_base_url() -> String {
    "https://api.cleanpay.app".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_update_interval_secs() -> u64 {
    300
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("CLEANPAY").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!("Invalid configuration, using defaults: {}", e);
            Config {
                server: ServerConfig::default(),
                cleanpay: CleanPayConfig::default(),
                entries: Vec::new(),
            }
        });

        Ok(config)
    }
}
