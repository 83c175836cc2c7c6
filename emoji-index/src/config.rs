//! Index configuration, loadable from TOML.
//!
//! ```toml
//! locale = "de-AT"
//! platform = "linux"
//! cache_dir = "/var/cache/emoji-index"
//!
//! [source]
//! request_timeout_secs = 10
//!
//! [usage]
//! max_favorites = 16
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fallback::FallbackConfig;
use crate::locale::{Locale, Platform};
use crate::search::SearchConfig;
use crate::source::{DEFAULT_EMOJIBASE_URL, DEFAULT_EMOJI_DATA_URL};
use crate::usage::UsageConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid locale: {0}")]
    InvalidLocale(String),
}

/// Remote feed settings shared by every network source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub emoji_data_url: String,
    pub emojibase_base_url: String,
    pub request_timeout_secs: u64,
    /// Cached batches older than this are refreshed in the background
    pub refresh_interval_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            emoji_data_url: DEFAULT_EMOJI_DATA_URL.to_string(),
            emojibase_base_url: DEFAULT_EMOJIBASE_URL.to_string(),
            request_timeout_secs: 15,
            refresh_interval_secs: 24 * 60 * 60,
        }
    }
}

impl SourceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Initial locale, e.g. "en", "pt-BR"
    pub locale: String,
    pub platform: Platform,
    /// Cache directory; `None` keeps the cache in memory only
    pub cache_dir: Option<PathBuf>,
    pub source: SourceConfig,
    pub fallback: FallbackConfig,
    pub usage: UsageConfig,
    pub search: SearchConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            platform: Platform::current(),
            cache_dir: None,
            source: SourceConfig::default(),
            fallback: FallbackConfig::default(),
            usage: UsageConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl IndexConfig {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn parsed_locale(&self) -> Result<Locale, ConfigError> {
        self.locale.parse().map_err(ConfigError::InvalidLocale)
    }
}
