//! Configuration management for feedstash.
//!
//! Configuration is read from `<home>/config.toml`, where `<home>` is
//! `$FEEDSTASH_HOME` or `~/.feedstash`. If the file doesn't exist, a default
//! configuration with comments is created.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "FEEDSTASH_HOME";

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetch: FetchConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,

    /// Directory the config was loaded from. Not part of the file.
    #[serde(skip)]
    pub home: PathBuf,
}

/// Remote feed API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-page item ceiling enforced by most servers (default: 40)
    pub items_per_request: usize,

    /// Rate-limit budget assumed before the first response is seen (default: 300)
    pub initial_rate_limit: u64,

    /// Request timeout in seconds (default: 10)
    pub timeout_secs: u64,

    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            items_per_request: 40,
            initial_rate_limit: 300,
            timeout_secs: 10,
            user_agent: concat!("feedstash/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Partitioned storage settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage root; defaults to `<home>/db`
    pub root: Option<PathBuf>,

    /// How many committed ids seed a writer session (default: 2000)
    pub lookback_ids: usize,

    /// How many day partitions incremental lookups consult (default: 1)
    pub lookback_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: None,
            lookback_ids: 2000,
            lookback_days: 1,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,

    /// Static asset directory; defaults to `<home>/html`
    pub html_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            html_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from the home directory.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    pub fn load() -> Result<Self, ConfigError> {
        let home = Self::home_dir()?;
        Self::load_from(&home)
    }

    pub fn load_from(home: &Path) -> Result<Self, ConfigError> {
        let config_path = home.join("config.toml");

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self {
                home: home.to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path,
            source: e,
        })?;
        config.home = home.to_path_buf();

        Ok(config)
    }

    /// `$FEEDSTASH_HOME`, falling back to `~/.feedstash`.
    pub fn home_dir() -> Result<PathBuf, ConfigError> {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(home));
        }
        let user_home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(user_home.join(".feedstash"))
    }

    pub fn storage_root(&self) -> PathBuf {
        self.storage
            .root
            .clone()
            .unwrap_or_else(|| self.home.join("db"))
    }

    pub fn html_dir(&self) -> PathBuf {
        self.server
            .html_dir
            .clone()
            .unwrap_or_else(|| self.home.join("html"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> &'static str {
        r##"# feedstash configuration

[fetch]
# Most servers cap a single page at 40 items
items_per_request = 40

# Rate-limit budget assumed until the first response reports one
initial_rate_limit = 300

# Request timeout in seconds
timeout_secs = 10

[storage]
# Storage root (default: <home>/db)
# root = "/var/lib/feedstash"

# Number of most recent stored ids used to skip already-stored items
lookback_ids = 2000

# Number of day partitions consulted when resuming a fetch
lookback_days = 1

[server]
bind = "127.0.0.1:5000"

# Static asset directory (default: <home>/html)
# html_dir = "/srv/feedstash/html"
"##
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine home directory, set {HOME_ENV}")]
    NoHomeDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
