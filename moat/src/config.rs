use std::{net::SocketAddr, path::Path, time::Duration};

use anyhow::Context;
use moat_resolver::{blocking::BlockingConfig, conditional::ConditionalConfig, upstream::UpstreamAddr};
use serde::{Deserialize, Serialize};
use tracing::{Level, level_filters::LevelFilter};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum LogLevel {
    #[serde(rename = "trace")]
    Trace,
    #[serde(rename = "debug")]
    Debug,
    #[default]
    #[serde(rename = "info")]
    Info,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl From<LogLevel> for Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(value: LogLevel) -> Self {
        LevelFilter::from_level(Level::from(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    /// IP address to listen on for DNS queries.
    #[serde(default = "default_server_ip")]
    pub ip: String,
    /// Port to listen on for DNS queries.
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Logging level for the server.
    #[serde(default)]
    pub log_level: LogLevel,
    /// Time budget of a single DNS request in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: default_server_ip(),
            port: default_server_port(),
            log_level: LogLevel::default(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.ip, self.port)
            .parse()
            .with_context(|| format!("invalid server address {}:{}", self.ip, self.port))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HttpConfig {
    /// IP address the control API listens on.
    #[serde(default = "default_http_ip")]
    pub ip: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            ip: default_http_ip(),
            port: default_http_port(),
        }
    }
}

impl HttpConfig {
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.ip, self.port)
            .parse()
            .with_context(|| format!("invalid http address {}:{}", self.ip, self.port))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Upstreams used for every query that is neither routed nor blocked.
    #[serde(default = "default_upstreams")]
    pub default: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            default: default_upstreams(),
        }
    }
}

impl UpstreamConfig {
    pub fn addrs(&self) -> anyhow::Result<Vec<UpstreamAddr>> {
        self.default.iter().map(|u| u.parse()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub conditional: ConditionalConfig,
    #[serde(default)]
    pub blocking: BlockingConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found")]
    NotFound,
    #[error("invalid config: {0}")]
    Decode(String),
}

fn decode_from_path(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|_| ConfigError::NotFound)?;
    decode(&content)
}

pub fn decode(content: &str) -> Result<Config, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::Decode(e.message().into()))
}

/// Load the config, writing a default one to `config_path` if there is none yet.
pub fn load_config(config_path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = config_path.as_ref();

    match decode_from_path(path) {
        Ok(cfg) => Ok(cfg),
        Err(ConfigError::NotFound) => create_default_config(path),
        Err(e) => Err(e.into()),
    }
}

pub fn create_default_config(path: &Path) -> anyhow::Result<Config> {
    let cfg = Config::default();

    let toml_str = toml::to_string_pretty(&cfg)?;
    std::fs::write(path, toml_str).with_context(|| format!("failed to write default config to {}", path.display()))?;

    Ok(cfg)
}

fn default_server_ip() -> String {
    "0.0.0.0".into()
}

fn default_server_port() -> u16 {
    53
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_http_ip() -> String {
    "127.0.0.1".into()
}

fn default_http_port() -> u16 {
    4000
}

fn default_upstreams() -> Vec<String> {
    vec!["1.1.1.1".into(), "9.9.9.9".into()]
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
