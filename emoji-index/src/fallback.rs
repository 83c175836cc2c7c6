//! Bundled or caller-supplied offline snapshot used when there is no cache.
//!
//! Lookup order: explicit path, `{base}-{locale}.json`, `{base}-{language}.json`,
//! `{base}.json`. The first file that exists is used; a file that exists but
//! cannot be decoded is an error rather than a silent skip.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::locale::Locale;
use crate::models::RawEntry;
use crate::source::{read_entries, SourceResult};

pub const DEFAULT_FALLBACK_BASE_NAME: &str = "emoji-fallback";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Explicit file, tried before anything else
    pub path: Option<PathBuf>,
    /// Directory holding locale-suffixed fallback files
    pub directory: Option<PathBuf>,
    pub base_name: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            path: None,
            directory: None,
            base_name: DEFAULT_FALLBACK_BASE_NAME.to_string(),
        }
    }
}

impl FallbackConfig {
    pub fn is_configured(&self) -> bool {
        self.path.is_some() || self.directory.is_some()
    }

    /// Candidate files in priority order; duplicates removed
    pub fn candidate_paths(&self, locale: &Locale) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(path) = &self.path {
            paths.push(path.clone());
        }
        if let Some(directory) = &self.directory {
            for name in [
                locale_file_name(&self.base_name, Some(&locale.identifier())),
                locale_file_name(&self.base_name, Some(&locale.language)),
                locale_file_name(&self.base_name, None),
            ] {
                let path = directory.join(name);
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
        paths
    }
}

/// `emoji-fallback-de.json`, or `emoji-fallback.json` without a suffix
pub fn locale_file_name(base_name: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("{base_name}-{suffix}.json"),
        None => format!("{base_name}.json"),
    }
}

/// Load the first existing fallback file for `locale`.
/// Returns `Ok(None)` when no candidate exists.
pub async fn load_fallback(
    config: &FallbackConfig,
    locale: &Locale,
) -> SourceResult<Option<(PathBuf, Vec<RawEntry>)>> {
    for path in config.candidate_paths(locale) {
        if !exists(&path).await {
            continue;
        }
        let entries = read_entries(&path).await?;
        debug!(path = %path.display(), entries = entries.len(), "loaded fallback file");
        return Ok(Some((path, entries)));
    }
    Ok(None)
}

async fn exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
