//! Configuration file handling

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Default settings
    #[serde(default)]
    pub defaults: Defaults,

    /// Test runner settings
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Stream connection settings
    #[serde(default)]
    pub stream: StreamConfig,
}

/// Default settings
#[derive(Debug, Deserialize, Clone)]
pub struct Defaults {
    /// Directory searched for test cases when none is given
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
}

impl Default for Defaults {
    fn default() -> Self {
        Self { dir: default_dir() }
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from("tests")
}

/// Test runner settings
#[derive(Debug, Deserialize, Clone)]
pub struct RunnerConfig {
    /// Timeout for requests and receives without an explicit timeout
    #[serde(default = "default_timeout")]
    pub default_timeout_secs: u64,

    /// Environment variables with this prefix seed every group store
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,

    /// Whether HTTP redirects are followed
    #[serde(default)]
    pub follow_redirects: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout(),
            env_prefix: default_env_prefix(),
            follow_redirects: false,
        }
    }
}

impl RunnerConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

fn default_timeout() -> u64 {
    5
}

fn default_env_prefix() -> String {
    "TESTS_".to_string()
}

/// Stream connection settings
#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    /// Interval between keepalive frames
    #[serde(default = "default_keepalive")]
    pub keepalive_interval_ms: u64,

    /// Maximum number of inbound messages buffered per connection
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            keepalive_interval_ms: default_keepalive(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl StreamConfig {
    /// Never zero: a zero period would stop the keepalive ticker
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms.max(1))
    }
}

fn default_keepalive() -> u64 {
    1000
}
fn default_queue_capacity() -> usize {
    256
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    super::Error::FileRead {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    }
                })?;
                return Self::parse(&content);
            }
        }
        Ok(Self::default())
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}
