use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server address (e.g., "0.0.0.0:8080")
    #[serde(default = "default_addr")]
    pub addr: String,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
    /// Storage backend selection
    #[serde(default)]
    pub backend: BackendConfig,
    /// Polling configuration for the sync controller
    #[serde(default)]
    pub sync: SyncConfig,
    /// Outbound HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,
    /// Function-style server settings
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Which storage adapter backs the request router
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    #[default]
    Local,
    Rest,
    Edge,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub mode: BackendMode,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub rest: RestConfig,
    #[serde(default)]
    pub edge: EdgeConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LocalConfig {
    /// File holding the key-value snapshot; empty keeps everything in memory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RestConfig {
    /// Project URL, e.g. "https://xyz.supabase.co"
    #[serde(default)]
    pub url: String,
    /// Anonymous API key, sent as `apikey` and bearer token
    #[serde(default)]
    pub api_key: String,
    /// Table holding the tool rows
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            table: default_table(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EdgeConfig {
    /// Base URL of the function-style API, routes are appended to it
    #[serde(default)]
    pub url: String,
    /// Bearer token
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Refresh interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Prefix the tool routes are nested under, e.g. "/make-server"
    #[serde(default)]
    pub base_path: String,
    /// Key-value snapshot file; empty keeps records in memory
    #[serde(default)]
    pub data_path: Option<PathBuf>,
}

// Default value functions
fn default_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_table() -> String {
    "fracking_tools".to_string()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            log: LogConfig::default(),
            backend: BackendConfig::default(),
            sync: SyncConfig::default(),
            http: HttpConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
