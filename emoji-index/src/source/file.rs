use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{ensure_not_empty, DataSource, SourceError, SourceResult, DEFAULT_REFRESH_INTERVAL};
use crate::models::RawEntry;

/// A local JSON file in the cache/fallback format
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    refresh_interval: Duration,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DataSource for FileSource {
    fn identifier(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string());
        format!("file:{name}")
    }

    fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    async fn fetch(&self) -> SourceResult<Vec<RawEntry>> {
        let entries = read_entries(&self.path).await?;
        ensure_not_empty(&self.identifier(), entries)
    }
}

/// Read a JSON array of entries. An empty array is returned as-is.
pub async fn read_entries(path: &Path) -> SourceResult<Vec<RawEntry>> {
    let bytes = tokio::fs::read(path).await.map_err(|error| SourceError::Io {
        path: path.display().to_string(),
        error,
    })?;
    let entries: Vec<RawEntry> =
        serde_json::from_slice(&bytes).map_err(|e| SourceError::Decode {
            what: path.display().to_string(),
            message: e.to_string(),
        })?;
    debug!(path = %path.display(), entries = entries.len(), "read entry file");
    Ok(entries)
}

/// Write entries in the cache/fallback format, creating parent directories.
pub async fn write_entries(path: &Path, entries: &[RawEntry], pretty: bool) -> SourceResult<()> {
    let io_error = |error| SourceError::Io {
        path: path.display().to_string(),
        error,
    };
    let bytes = if pretty {
        serde_json::to_vec_pretty(entries)
    } else {
        serde_json::to_vec(entries)
    }
    .map_err(|e| SourceError::Decode {
        what: path.display().to_string(),
        message: e.to_string(),
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    tokio::fs::write(path, bytes).await.map_err(io_error)
}
