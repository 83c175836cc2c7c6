//! EmojiKit Core - emoji metadata index for the picker
//!
//! Fetches emoji metadata from remote feeds (blending a localized feed with an
//! image-vendor feed when needed), keeps it in a two-tier cache, falls back to
//! a bundled file when offline, and serves lookups, sections, tiered search
//! and usage-ranked favorites.
//!
//! Types are exported via UniFFI proc-macros (#[derive(uniffi::Record/Enum)]).

pub mod cache;
mod catalog;
pub mod config;
pub mod fallback;
pub mod interface;
pub mod locale;
pub mod models;
pub mod provider;
pub mod search;
pub mod source;
mod store;
pub mod usage;

pub use cache::{Cache, CacheError, CachedBatch, DiskCache};
pub use catalog::CatalogIndex;
pub use config::{ConfigError, IndexConfig, SourceConfig};
pub use interface::*;
pub use locale::{resolve_source, Locale, Platform};
pub use models::RawEntry;
pub use provider::{EmojiIndex, IndexError, IndexOptions};
pub use source::{Blender, DataSource, SourceError};
pub use store::EmojiStore;
pub use usage::{UsageConfig, UsageTracker};

uniffi::setup_scaffolding!("emoji_index");
