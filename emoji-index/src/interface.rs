//! Emoji Index FFI Interface Definition
//!
//! This file defines the public interface exposed to Swift via UniFFI.
//! It acts as the source of truth for shared types.

use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// The nine fixed emoji categories, declared in picker order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, uniffi::Enum)]
pub enum EmojiCategory {
    SmileysEmotion,
    PeopleBody,
    AnimalsNature,
    FoodDrink,
    TravelPlaces,
    Activities,
    Objects,
    Symbols,
    Flags,
}

impl EmojiCategory {
    /// Every category in section order.
    pub const ALL: [EmojiCategory; 9] = [
        EmojiCategory::SmileysEmotion,
        EmojiCategory::PeopleBody,
        EmojiCategory::AnimalsNature,
        EmojiCategory::FoodDrink,
        EmojiCategory::TravelPlaces,
        EmojiCategory::Activities,
        EmojiCategory::Objects,
        EmojiCategory::Symbols,
        EmojiCategory::Flags,
    ];

    /// Canonical Unicode group name, also the raw category string sources emit.
    pub fn display_name(&self) -> &'static str {
        match self {
            EmojiCategory::SmileysEmotion => "Smileys & Emotion",
            EmojiCategory::PeopleBody => "People & Body",
            EmojiCategory::AnimalsNature => "Animals & Nature",
            EmojiCategory::FoodDrink => "Food & Drink",
            EmojiCategory::TravelPlaces => "Travel & Places",
            EmojiCategory::Activities => "Activities",
            EmojiCategory::Objects => "Objects",
            EmojiCategory::Symbols => "Symbols",
            EmojiCategory::Flags => "Flags",
        }
    }
}

/// Ordering applied to search results after tiered matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, uniffi::Enum)]
pub enum SearchRanking {
    /// Tier order is the relevance order
    #[default]
    Relevance,
    /// Most used first, by decayed usage score
    Usage,
    /// By name, case-insensitive
    Alphabetical,
}

/// Index load lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Structs)
// ═══════════════════════════════════════════════════════════════════════════════

/// A resolved emoji. `character` doubles as the identifier.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct Emoji {
    pub character: String,
    pub name: String,
    pub category: EmojiCategory,
    /// Category string exactly as the source reported it
    pub raw_category: String,
    pub shortcodes: Vec<String>,
    pub keywords: Vec<String>,
    pub supports_skin_tone: bool,
}

impl Emoji {
    pub fn id(&self) -> &str {
        &self.character
    }
}

/// One non-empty category with its emoji in catalog order
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct EmojiSection {
    pub category: EmojiCategory,
    pub emojis: Vec<Emoji>,
}

/// Cache namespace introspection for the management surface
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct CacheEntryInfo {
    pub identifier: String,
    pub size_bytes: u64,
    pub entry_count: u64,
    pub last_updated_unix: i64,
    pub age_secs: u64,
}

/// Error type for emoji index operations
#[derive(Debug, Error, uniffi::Error)]
pub enum EmojiIndexError {
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Cache read error: {0}")]
    CacheRead(String),
    #[error("Cache write error: {0}")]
    CacheWrite(String),
    #[error("No data available: {0}")]
    NoDataAvailable(String),
    #[error("Source returned no entries: {0}")]
    EmptyData(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Operation cancelled")]
    Cancelled,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// The interface the picker UI consumes.
/// Every call auto-loads the index on first use.
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait EmojiIndexApi: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────────

    /// Load from cache, fallback file or network. No-op once loaded.
    async fn load(&self) -> Result<(), EmojiIndexError>;

    /// Fetch from the active source, persist, and rebuild the index
    async fn refresh(&self) -> Result<(), EmojiIndexError>;

    /// Drop the cached batch for the active source and run the load pipeline again
    async fn clear_cache_and_reload(&self) -> Result<(), EmojiIndexError>;

    /// Switch locale; resolves a new source and reloads under its cache namespace
    async fn set_locale(&self, locale: String) -> Result<(), EmojiIndexError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Every loaded emoji in catalog order. Surfaces the load error if nothing could be loaded.
    async fn all_emojis(&self) -> Result<Vec<Emoji>, EmojiIndexError>;

    /// Catalog grouped into non-empty sections in fixed category order
    async fn sections(&self) -> Vec<EmojiSection>;

    /// Non-empty categories in fixed order
    async fn categories(&self) -> Vec<EmojiCategory>;

    /// Look up by glyph
    async fn emoji_for_character(&self, character: String) -> Option<Emoji>;

    /// Look up by shortcode, case-insensitive, surrounding colons optional
    async fn emoji_for_shortcode(&self, shortcode: String) -> Option<Emoji>;

    /// Tiered search. Empty query returns the whole catalog.
    async fn search(&self, query: String, ranking: SearchRanking) -> Vec<Emoji>;

    /// Most used emoji, resolved against the current index
    async fn favorites(&self) -> Vec<Emoji>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Record that the user picked `character`
    fn record_use(&self, character: String);

    // ─────────────────────────────────────────────────────────────────────────────
    // Cache Management
    // ─────────────────────────────────────────────────────────────────────────────

    /// Every cached namespace with size, count and age
    async fn cache_entries(&self) -> Result<Vec<CacheEntryInfo>, EmojiIndexError>;

    /// Aggregate size of the cache in bytes
    async fn cache_size(&self) -> Result<u64, EmojiIndexError>;

    /// Remove namespaces older than `max_age_secs`. Returns the removed identifiers.
    async fn clear_expired_cache(&self, max_age_secs: u64) -> Result<Vec<String>, EmojiIndexError>;
}

impl From<crate::source::SourceError> for EmojiIndexError {
    fn from(e: crate::source::SourceError) -> Self {
        use crate::source::SourceError;
        let message = e.to_string();
        match e {
            SourceError::Network(_) => EmojiIndexError::NetworkUnavailable(message),
            SourceError::InvalidResponse { .. } => EmojiIndexError::InvalidResponse(message),
            SourceError::Decode { .. } => EmojiIndexError::Decode(message),
            SourceError::EmptyData(_) => EmojiIndexError::EmptyData(message),
            SourceError::InvalidUrl { .. } => EmojiIndexError::InvalidConfiguration(message),
            SourceError::Unavailable { .. } => EmojiIndexError::SourceUnavailable(message),
            SourceError::Io { .. } => EmojiIndexError::NoDataAvailable(message),
        }
    }
}

impl From<crate::cache::CacheError> for EmojiIndexError {
    fn from(e: crate::cache::CacheError) -> Self {
        use crate::cache::CacheError;
        let message = e.to_string();
        match e {
            CacheError::Read { .. } => EmojiIndexError::CacheRead(message),
            CacheError::Decode { .. } => EmojiIndexError::Decode(message),
            CacheError::Write { .. } => EmojiIndexError::CacheWrite(message),
        }
    }
}

impl From<crate::provider::IndexError> for EmojiIndexError {
    fn from(e: crate::provider::IndexError) -> Self {
        use crate::provider::IndexError;
        match e {
            IndexError::Source(e) => e.into(),
            IndexError::Cache(e) => e.into(),
            e @ IndexError::NoDataAvailable { .. } => {
                EmojiIndexError::NoDataAvailable(e.to_string())
            }
            e @ IndexError::NoResolver => EmojiIndexError::InvalidConfiguration(e.to_string()),
            IndexError::Config(e) => e.into(),
        }
    }
}

impl From<crate::config::ConfigError> for EmojiIndexError {
    fn from(e: crate::config::ConfigError) -> Self {
        EmojiIndexError::InvalidConfiguration(e.to_string())
    }
}
