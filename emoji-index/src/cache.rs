//! Two-tier batch cache: an in-memory map over one JSON file per source.
//!
//! A batch's `last_updated` is the file's modification time. Nothing inside
//! the payload records when it was written.

use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::IgnoredAny;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::interface::CacheEntryInfo;
use crate::models::RawEntry;

const CACHE_EXTENSION: &str = "json";

/// Bytes escaped in cache file names: everything but `[A-Za-z0-9._-]`
const FILE_NAME_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to read cache for {source_id}: {error}")]
    Read {
        source_id: String,
        #[source]
        error: std::io::Error,
    },
    #[error("failed to decode cache for {source_id}: {message}")]
    Decode { source_id: String, message: String },
    #[error("failed to write cache for {source_id}: {error}")]
    Write {
        source_id: String,
        #[source]
        error: std::io::Error,
    },
}

pub type CacheResult<T> = Result<T, CacheError>;

fn write_error(source_id: &str, error: impl Into<std::io::Error>) -> CacheError {
    CacheError::Write {
        source_id: source_id.to_string(),
        error: error.into(),
    }
}

/// A cached batch and when it was persisted
#[derive(Debug, Clone, PartialEq)]
pub struct CachedBatch {
    pub entries: Vec<RawEntry>,
    pub last_updated: DateTime<Utc>,
}

impl CachedBatch {
    pub fn age(&self) -> Duration {
        age_since(self.last_updated)
    }
}

/// Batch storage namespaced by source identifier.
#[async_trait]
pub trait Cache: Send + Sync {
    /// `Ok(None)` is a plain miss
    async fn load(&self, source_id: &str) -> CacheResult<Option<CachedBatch>>;

    async fn save(&self, entries: &[RawEntry], source_id: &str) -> CacheResult<()>;

    async fn clear(&self, source_id: &str) -> CacheResult<()>;

    async fn clear_all(&self) -> CacheResult<()>;
}

/// Expired iff strictly older than `max_age`
pub fn is_age_expired(age: Duration, max_age: Duration) -> bool {
    age > max_age
}

fn age_since(timestamp: DateTime<Utc>) -> Duration {
    (Utc::now() - timestamp).to_std().unwrap_or(Duration::ZERO)
}

/// Disk cache with an in-memory layer. Without a directory it is memory-only.
pub struct DiskCache {
    directory: Option<PathBuf>,
    memory: Mutex<HashMap<String, CachedBatch>>,
    /// Held across file replace + memory update so both tiers agree on the last writer
    write_lock: tokio::sync::Mutex<()>,
}

impl DiskCache {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: Some(directory.into()),
            memory: Mutex::new(HashMap::new()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            directory: None,
            memory: Mutex::new(HashMap::new()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    fn path_for(&self, source_id: &str) -> Option<PathBuf> {
        self.directory
            .as_ref()
            .map(|dir| dir.join(encode_file_name(source_id)))
    }

    /// Drop the in-memory layer so the next load reads from disk
    pub fn evict_memory(&self) {
        self.memory.lock().clear();
    }

    /// Every cached namespace, sorted by identifier
    pub async fn list_entries(&self) -> CacheResult<Vec<CacheEntryInfo>> {
        Ok(self
            .entries_with_age()
            .await?
            .into_iter()
            .map(|(info, _)| info)
            .collect())
    }

    /// Entries paired with their exact age; `age_secs` alone is truncated
    async fn entries_with_age(&self) -> CacheResult<Vec<(CacheEntryInfo, Duration)>> {
        let Some(directory) = &self.directory else {
            let memory = self.memory.lock();
            let mut entries: Vec<(CacheEntryInfo, Duration)> = memory
                .iter()
                .map(|(id, batch)| {
                    let age = batch.age();
                    let info = CacheEntryInfo {
                        identifier: id.clone(),
                        size_bytes: serde_json::to_vec(&batch.entries)
                            .map(|b| b.len() as u64)
                            .unwrap_or(0),
                        entry_count: batch.entries.len() as u64,
                        last_updated_unix: batch.last_updated.timestamp(),
                        age_secs: age.as_secs(),
                    };
                    (info, age)
                })
                .collect();
            entries.sort_by(|(a, _), (b, _)| a.identifier.cmp(&b.identifier));
            return Ok(entries);
        };

        let mut entries = Vec::new();
        for (source_id, path) in list_cache_files(directory).await? {
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                // Removed concurrently
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(error) => return Err(CacheError::Read { source_id, error }),
            };
            let last_updated = modified_time(&metadata, &source_id)?;
            let entry_count = match tokio::fs::read(&path).await {
                Ok(bytes) => serde_json::from_slice::<Vec<IgnoredAny>>(&bytes)
                    .map(|v| v.len() as u64)
                    .unwrap_or(0),
                Err(_) => 0,
            };
            let age = age_since(last_updated);
            let info = CacheEntryInfo {
                identifier: source_id,
                size_bytes: metadata.len(),
                entry_count,
                last_updated_unix: last_updated.timestamp(),
                age_secs: age.as_secs(),
            };
            entries.push((info, age));
        }
        entries.sort_by(|(a, _), (b, _)| a.identifier.cmp(&b.identifier));
        Ok(entries)
    }

    /// Aggregate payload size in bytes
    pub async fn total_size(&self) -> CacheResult<u64> {
        Ok(self
            .list_entries()
            .await?
            .iter()
            .map(|e| e.size_bytes)
            .sum())
    }

    /// Whether `source_id` is older than `max_age`. A missing namespace counts
    /// as expired.
    pub async fn is_expired(&self, source_id: &str, max_age: Duration) -> CacheResult<bool> {
        let last_updated = match self.path_for(source_id) {
            Some(path) => match tokio::fs::metadata(&path).await {
                Ok(metadata) => modified_time(&metadata, source_id)?,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
                Err(error) => {
                    return Err(CacheError::Read {
                        source_id: source_id.to_string(),
                        error,
                    })
                }
            },
            None => {
                let cached = self.memory.lock().get(source_id).map(|b| b.last_updated);
                match cached {
                    Some(last_updated) => last_updated,
                    None => return Ok(true),
                }
            }
        };
        Ok(is_age_expired(age_since(last_updated), max_age))
    }

    /// Remove every namespace older than `max_age`; returns what was removed
    pub async fn clear_expired(&self, max_age: Duration) -> CacheResult<Vec<String>> {
        let mut removed = Vec::new();
        for (entry, age) in self.entries_with_age().await? {
            if is_age_expired(age, max_age) {
                self.clear(&entry.identifier).await?;
                removed.push(entry.identifier);
            }
        }
        if !removed.is_empty() {
            info!(removed = removed.len(), "swept expired cache entries");
        }
        Ok(removed)
    }
}

#[async_trait]
impl Cache for DiskCache {
    async fn load(&self, source_id: &str) -> CacheResult<Option<CachedBatch>> {
        let cached = self.memory.lock().get(source_id).cloned();
        if cached.is_some() {
            return Ok(cached);
        }
        let Some(path) = self.path_for(source_id) else {
            return Ok(None);
        };

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(CacheError::Read {
                    source_id: source_id.to_string(),
                    error,
                })
            }
        };
        let entries: Vec<RawEntry> =
            serde_json::from_slice(&bytes).map_err(|e| CacheError::Decode {
                source_id: source_id.to_string(),
                message: e.to_string(),
            })?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|error| CacheError::Read {
                source_id: source_id.to_string(),
                error,
            })?;
        let batch = CachedBatch {
            entries,
            last_updated: modified_time(&metadata, source_id)?,
        };

        debug!(source = source_id, entries = batch.entries.len(), "cache loaded from disk");
        self.memory
            .lock()
            .insert(source_id.to_string(), batch.clone());
        Ok(Some(batch))
    }

    async fn save(&self, entries: &[RawEntry], source_id: &str) -> CacheResult<()> {
        let Some(path) = self.path_for(source_id) else {
            self.memory.lock().insert(
                source_id.to_string(),
                CachedBatch {
                    entries: entries.to_vec(),
                    last_updated: Utc::now(),
                },
            );
            return Ok(());
        };

        let bytes = serde_json::to_vec(entries).map_err(|e| write_error(source_id, e))?;

        let _writer = self.write_lock.lock().await;
        let target = path.clone();
        let replaced = tokio::task::spawn_blocking(move || replace_file(&target, &bytes)).await;
        match replaced {
            Ok(result) => result.map_err(|e| write_error(source_id, e))?,
            Err(join_error) => return Err(write_error(source_id, std::io::Error::other(join_error))),
        }

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| write_error(source_id, e))?;
        let last_updated = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        // Memory only follows a successful write
        self.memory.lock().insert(
            source_id.to_string(),
            CachedBatch {
                entries: entries.to_vec(),
                last_updated,
            },
        );
        debug!(source = source_id, entries = entries.len(), "cache saved");
        Ok(())
    }

    async fn clear(&self, source_id: &str) -> CacheResult<()> {
        self.memory.lock().remove(source_id);
        if let Some(path) = self.path_for(source_id) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(error) => {
                    return Err(CacheError::Write {
                        source_id: source_id.to_string(),
                        error,
                    })
                }
            }
        }
        Ok(())
    }

    async fn clear_all(&self) -> CacheResult<()> {
        self.memory.lock().clear();
        let Some(directory) = &self.directory else {
            return Ok(());
        };
        for (source_id, path) in list_cache_files(directory).await? {
            if let Err(error) = tokio::fs::remove_file(&path).await {
                if error.kind() != ErrorKind::NotFound {
                    warn!(source = %source_id, %error, "failed to remove cache file");
                    return Err(CacheError::Write { source_id, error });
                }
            }
        }
        Ok(())
    }
}

/// Write `bytes` to a uniquely named sibling, then rename it over `path`.
/// Readers see either the old file or the new one, never a mix.
fn replace_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "cache path has no parent"))?;
    std::fs::create_dir_all(parent)?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn modified_time(metadata: &std::fs::Metadata, source_id: &str) -> CacheResult<DateTime<Utc>> {
    metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .map_err(|error| CacheError::Read {
            source_id: source_id.to_string(),
            error,
        })
}

/// `(source_id, path)` for every cache file in `directory`. A missing
/// directory is an empty cache.
async fn list_cache_files(directory: &Path) -> CacheResult<Vec<(String, PathBuf)>> {
    let read_error = |error| CacheError::Read {
        source_id: directory.display().to_string(),
        error,
    };
    let mut dir = match tokio::fs::read_dir(directory).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(read_error(error)),
    };

    let mut files = Vec::new();
    while let Some(entry) = dir.next_entry().await.map_err(read_error)? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(source_id) = decode_file_name(name) {
            files.push((source_id, path));
        }
    }
    Ok(files)
}

/// Reversible identifier → file name: `[A-Za-z0-9._-]` kept, everything
/// else percent-encoded per UTF-8 byte.
pub fn encode_file_name(source_id: &str) -> String {
    format!(
        "{}.{CACHE_EXTENSION}",
        utf8_percent_encode(source_id, FILE_NAME_SET)
    )
}

/// Inverse of `encode_file_name`. Names it would never produce (stray `%`,
/// lowercase escapes, other extensions) are not cache files.
pub fn decode_file_name(name: &str) -> Option<String> {
    let stem = name.strip_suffix(&format!(".{CACHE_EXTENSION}"))?;
    let source_id = percent_decode_str(stem).decode_utf8().ok()?;
    if source_id.is_empty() || utf8_percent_encode(&source_id, FILE_NAME_SET).to_string() != stem {
        return None;
    }
    Some(source_id.into_owned())
}

/// Set a cache file's modification time
#[cfg(test)]
pub(crate) fn backdate(path: &Path, by: Duration) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(std::time::SystemTime::now() - by).unwrap();
}
