use std::path::PathBuf;

use crate::app::error::{FeedstashError, Result};
use crate::config::Config;
use crate::fetcher::{FetchSettings, HttpPageSource};
use crate::server::ServerState;
use crate::store::Dataset;

/// Resolved configuration shared by every command.
pub struct AppContext {
    pub config: Config,
    pub storage_root: PathBuf,
    pub html_dir: PathBuf,
}

impl AppContext {
    /// Load `<home>/config.toml`, creating it on first run.
    pub fn new() -> Result<Self> {
        let config = Config::load().map_err(|e| FeedstashError::Config(e.to_string()))?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        let storage_root = config.storage_root();
        let html_dir = config.html_dir();
        Self {
            config,
            storage_root,
            html_dir,
        }
    }

    pub fn dataset(&self, server: &str, feed: &str) -> Dataset {
        Dataset::new(&self.storage_root, server, feed)
    }

    pub fn page_source(&self) -> Result<HttpPageSource> {
        HttpPageSource::new(&self.config.fetch)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings::from(&self.config.fetch)
    }

    pub fn server_state(&self) -> ServerState {
        ServerState::new(&self.storage_root, &self.html_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_resolves_default_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        let ctx = AppContext::from_config(config);

        assert_eq!(ctx.storage_root, dir.path().join("db"));
        assert_eq!(ctx.html_dir, dir.path().join("html"));
        assert_eq!(
            ctx.dataset("example.social", "home").dir(),
            dir.path().join("db/example.social/home.parquet")
        );
        assert_eq!(ctx.fetch_settings().items_per_request, 40);
        assert_eq!(ctx.fetch_settings().initial_rate_limit, 300);
    }
}
