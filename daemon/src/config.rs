use crate::cooldown::CooldownPolicy;
use crate::store::JsonFile;
use crate::upstream::Credentials;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_PATH: &str = "config.json";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("panel setting '{0}' is missing (set it in config.json or the {1} variable)")]
    Missing(&'static str, &'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PanelConfig {
    pub uri: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            uri: None,
            username: None,
            password: None,
            request_timeout_secs: 30,
        }
    }
}

impl PanelConfig {
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let field = |value: &Option<String>, name, env| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name, env))
        };
        Ok(Credentials {
            uri: field(&self.uri, "uri", "AMP_URI")?,
            username: field(&self.username, "username", "AMP_USERNAME")?,
            password: field(&self.password, "password", "AMP_PASSWORD")?,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// `false` keeps the snapshot in process memory only.
    pub redis: bool,
    pub host: String,
    pub port: u16,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis: true,
            host: "127.0.0.1".to_string(),
            port: 6379,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollerConfig {
    pub interval_secs: u64,
    pub concurrency: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            concurrency: 6,
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CooldownConfig {
    pub threshold: u32,
    pub base_secs: u64,
    pub max_secs: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            base_secs: 60,
            max_secs: 15 * 60,
        }
    }
}

impl CooldownConfig {
    pub fn policy(&self) -> CooldownPolicy {
        CooldownPolicy {
            threshold: self.threshold.max(1),
            base: Duration::from_secs(self.base_secs),
            max: Duration::from_secs(self.max_secs),
        }
    }
}

/// Settings fixed for the lifetime of the process.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub panel: PanelConfig,
    pub store: StoreConfig,
    pub poller: PollerConfig,
    pub cooldown: CooldownConfig,
}

impl JsonFile for AppConfig {}

fn set_number<T: std::str::FromStr>(target: &mut T, value: Option<String>) {
    if let Some(parsed) = value.and_then(|v| v.trim().parse().ok()) {
        *target = parsed;
    }
}

fn set_text(target: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        *target = Some(value);
    }
}

impl AppConfig {
    /// Reads `config.json` (writing defaults when absent), then the environment.
    pub fn load() -> anyhow::Result<AppConfig> {
        let mut config = Self::read_or_seed(Path::new(CONFIG_PATH))?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Overrides from environment-style variables; bad numbers are ignored.
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        set_text(&mut self.panel.uri, lookup("AMP_URI"));
        set_text(&mut self.panel.username, lookup("AMP_USERNAME"));
        set_text(&mut self.panel.password, lookup("AMP_PASSWORD"));
        set_number(&mut self.panel.request_timeout_secs, lookup("REQUEST_TIMEOUT_SECS"));

        if let Some(host) = lookup("REDIS_HOST").filter(|v| !v.trim().is_empty()) {
            self.store.host = host;
        }
        set_number(&mut self.store.port, lookup("REDIS_PORT"));

        set_number(&mut self.poller.interval_secs, lookup("POLL_INTERVAL_SECS"));
        set_number(&mut self.poller.concurrency, lookup("POLL_CONCURRENCY"));

        set_number(&mut self.cooldown.threshold, lookup("COOLDOWN_THRESHOLD"));
        set_number(&mut self.cooldown.base_secs, lookup("COOLDOWN_BASE_SECS"));
        set_number(&mut self.cooldown.max_secs, lookup("COOLDOWN_MAX_SECS"));
    }

    /// Copy safe to log.
    pub fn redacted(&self) -> AppConfig {
        let mut copy = self.clone();
        if copy.panel.password.is_some() {
            copy.panel.password = Some("***".to_string());
        }
        copy
    }
}
