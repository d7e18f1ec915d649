use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::view::{DEFAULT_MAX_PAGES_TO_SHOW, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Default quiet period before a search query settles
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// List engine configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Rows per page for newly mounted views
    pub page_size: u32,

    /// Width of the pager's page-number window
    pub max_pages_to_show: u32,

    /// Quiet period before a search query is dispatched
    pub search_debounce_ms: u64,

    /// Keep selected rows when navigating to another page
    pub persist_selection_across_pages: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages_to_show: DEFAULT_MAX_PAGES_TO_SHOW,
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            persist_selection_across_pages: false,
        }
    }
}

/// Configuration as read from a file; every field is optional
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub page_size: Option<u32>,
    pub max_pages_to_show: Option<u32>,
    pub search_debounce_ms: Option<u64>,
    pub persist_selection_across_pages: Option<bool>,
}

impl Config {
    /// Initialize configuration from defaults, environment and config file.
    ///
    /// An explicit `path` must exist; otherwise the usual locations are
    /// searched and a missing file is not an error.
    pub async fn init(path: Option<&Path>) -> Result<Self, ConfigError> {
        debug!("Initializing configuration");

        let mut config = Self::default();
        config.load_from_env();

        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover(),
        };
        if let Some(path) = path {
            let file_config = Self::load_from_file(&path).await?;
            config.merge_with(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(&mut self) {
        self.load_from_vars(|name| std::env::var(name).ok());
    }

    /// Apply `AUDITVIEW_*` variables from an arbitrary lookup
    pub fn load_from_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("AUDITVIEW_PAGE_SIZE") {
            match value.parse() {
                Ok(size) => self.page_size = size,
                Err(_) => warn!("Ignoring AUDITVIEW_PAGE_SIZE={}: not a number", value),
            }
        }

        if let Some(value) = lookup("AUDITVIEW_MAX_PAGES") {
            match value.parse() {
                Ok(max) => self.max_pages_to_show = max,
                Err(_) => warn!("Ignoring AUDITVIEW_MAX_PAGES={}: not a number", value),
            }
        }

        if let Some(value) = lookup("AUDITVIEW_DEBOUNCE_MS") {
            match value.parse() {
                Ok(ms) => self.search_debounce_ms = ms,
                Err(_) => warn!("Ignoring AUDITVIEW_DEBOUNCE_MS={}: not a number", value),
            }
        }

        if let Some(value) = lookup("AUDITVIEW_PERSIST_SELECTION") {
            self.persist_selection_across_pages = matches!(value.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    /// First existing config file, in priority order:
    /// 1. ./.auditview.json
    /// 2. ./auditview.json
    /// 3. $CONFIG_DIR/auditview/auditview.json
    pub fn discover() -> Option<PathBuf> {
        let mut config_paths = vec![
            PathBuf::from("./.auditview.json"),
            PathBuf::from("./auditview.json"),
        ];

        if let Some(config_dir) = dirs::config_dir() {
            config_paths.push(config_dir.join("auditview").join("auditview.json"));
        }

        config_paths.into_iter().find(|path| path.exists())
    }

    pub async fn load_from_file(path: &Path) -> Result<FileConfig, ConfigError> {
        debug!("Loading configuration from: {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Merge file values over this configuration
    pub fn merge_with(&mut self, other: FileConfig) {
        if let Some(page_size) = other.page_size {
            self.page_size = page_size;
        }
        if let Some(max) = other.max_pages_to_show {
            self.max_pages_to_show = max;
        }
        if let Some(ms) = other.search_debounce_ms {
            self.search_debounce_ms = ms;
        }
        if let Some(persist) = other.persist_selection_across_pages {
            self.persist_selection_across_pages = persist;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(ConfigError::Invalid(format!(
                "page_size must be between 1 and {} (got {})",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        if self.max_pages_to_show == 0 {
            return Err(ConfigError::Invalid("max_pages_to_show must be at least 1".to_string()));
        }

        Ok(())
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.page_size, 20);
        assert_eq!(config.max_pages_to_show, 3);
        assert_eq!(config.search_debounce(), Duration::from_millis(300));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("AUDITVIEW_PAGE_SIZE", "50"),
            ("AUDITVIEW_MAX_PAGES", "five"),
            ("AUDITVIEW_DEBOUNCE_MS", "0"),
            ("AUDITVIEW_PERSIST_SELECTION", "TRUE"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.load_from_vars(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.page_size, 50);
        assert_eq!(config.max_pages_to_show, 3, "unparseable value ignored");
        assert_eq!(config.search_debounce_ms, 0);
        assert!(config.persist_selection_across_pages);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = Config {
            page_size: 101,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = Config {
            max_pages_to_show: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_explicit_file_merges_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"page_size": 10, "search_debounce_ms": 150}}"#).unwrap();

        let config = Config::init(Some(file.path())).await.unwrap();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.search_debounce_ms, 150);
        assert_eq!(config.max_pages_to_show, Config::default().max_pages_to_show);
    }

    #[tokio::test]
    async fn test_invalid_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"page_size": 10, "theme": "dark"}}"#).unwrap();

        let err = Config::init(Some(file.path())).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_file_values_are_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"page_size": 0}}"#).unwrap();

        let err = Config::init(Some(file.path())).await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::init(Some(&dir.path().join("absent.json"))).await.unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
