//! Configuration management

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use secretstack_auth::{AuthMode, AuthzConfig};

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub authz: AuthzSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

/// Authorization settings as written in files and environment
#[derive(Debug, Deserialize)]
pub struct AuthzSettings {
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Policy oracle endpoint, `host:port` or a full URL
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for AuthzSettings {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            host: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_mode() -> String {
    "off".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Config {
    /// Load configuration from an optional file and `SECRETSTACK__*` environment
    ///
    /// Without an explicit path, `secretstack.{toml,yaml,json}` in the working
    /// directory is read when present.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("secretstack").required(false),
        };

        let builder = config::Config::builder().add_source(file).add_source(
            config::Environment::with_prefix("SECRETSTACK")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        Self::from_builder(builder)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> anyhow::Result<Self> {
        let config = builder.build().context("failed to read configuration")?;
        config
            .try_deserialize::<Config>()
            .context("invalid configuration")
    }

    /// Resolve the authorization section, rejecting unknown modes
    pub fn authz_config(&self) -> anyhow::Result<AuthzConfig> {
        let mode: AuthMode = self.authz.mode.parse()?;
        Ok(AuthzConfig {
            mode,
            endpoint: self.authz.host.clone().filter(|h| !h.trim().is_empty()),
            check_timeout: Duration::from_millis(self.authz.timeout_ms),
        })
    }
}
