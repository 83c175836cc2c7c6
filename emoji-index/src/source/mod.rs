//! Emoji data sources
//!
//! A `DataSource` produces one batch of `RawEntry` values from a single origin.
//! Its `identifier` namespaces the cache, so changing how an identifier is
//! built invalidates previously cached batches.

mod blend;
mod emoji_data;
mod emojibase;
mod file;
mod memory;
mod system;

pub use blend::{blend, Blender};
pub use emoji_data::{EmojiDataSource, ImageVendor, DEFAULT_EMOJI_DATA_URL};
pub use emojibase::{EmojibaseSource, DEFAULT_EMOJIBASE_URL, EMOJIBASE_LOCALES};
pub use file::{read_entries, write_entries, FileSource};
pub use memory::MemorySource;
pub use system::{parse_emoji_test, SystemSource};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::models::RawEntry;

/// How long a fetched batch is considered fresh unless a source says otherwise
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default timeout for remote feeds
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("network unavailable: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected HTTP status {status} from {url}")]
    InvalidResponse { status: u16, url: String },
    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },
    #[error("source {0} returned no entries")]
    EmptyData(String),
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("source {source_id} is unavailable: {reason}")]
    Unavailable { source_id: String, reason: String },
    #[error("IO error reading {path}: {error}")]
    Io { path: String, error: std::io::Error },
}

pub type SourceResult<T> = Result<T, SourceError>;

/// One origin of emoji entries.
#[async_trait]
pub trait DataSource: Send + Sync + fmt::Debug {
    /// Stable cache namespace for this source's batches
    fn identifier(&self) -> String;

    /// Age after which a cached batch from this source is stale
    fn refresh_interval(&self) -> Duration;

    /// Fetch a full batch. An empty batch is an error, never a valid catalog.
    async fn fetch(&self) -> SourceResult<Vec<RawEntry>>;
}

/// Parse and validate a feed URL
pub(crate) fn parse_url(raw: &str) -> SourceResult<Url> {
    let url = Url::parse(raw).map_err(|e| SourceError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SourceError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

pub(crate) fn http_client(timeout: Duration) -> SourceResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("emoji-index/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// GET `url` and decode the JSON body. Non-2xx responses are `InvalidResponse`,
/// transport failures are `Network`, body mismatches are `Decode`.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &Url,
) -> SourceResult<T> {
    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::InvalidResponse {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| SourceError::Decode {
        what: url.to_string(),
        message: e.to_string(),
    })
}

/// Reject empty batches so callers fall back instead of serving nothing
pub(crate) fn ensure_not_empty(
    source_id: &str,
    entries: Vec<RawEntry>,
) -> SourceResult<Vec<RawEntry>> {
    if entries.is_empty() {
        return Err(SourceError::EmptyData(source_id.to_string()));
    }
    Ok(entries)
}

/// Render a hyphen-separated hexcode sequence ("1F469-200D-1F4BB") as a string
pub(crate) fn hexcode_to_string(hexcode: &str) -> Option<String> {
    hexcode
        .split(|c: char| c == '-' || c == ' ')
        .filter(|part| !part.is_empty())
        .map(|part| u32::from_str_radix(part, 16).ok().and_then(char::from_u32))
        .collect()
}
