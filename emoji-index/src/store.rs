//! EmojiStore - Main API for Swift interop, designed for UniFFI export.
//!
//! Every async call is spawned onto a Tokio runtime: the caller's if there is
//! one, otherwise a process-wide fallback. reqwest and tokio::fs need a
//! reactor, and UniFFI polls futures from the foreign executor without one.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::warn;

use crate::cache::DiskCache;
use crate::config::IndexConfig;
use crate::interface::{
    CacheEntryInfo, Emoji, EmojiCategory, EmojiIndexApi, EmojiIndexError, EmojiSection,
    LoadState, SearchRanking,
};
use crate::provider::EmojiIndex;

/// Runtime for calls arriving from a thread without one (Swift, plain
/// `block_on`). Shared by every store and never dropped.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("emoji-index-worker")
        .build()
        .expect("Failed to create fallback tokio runtime")
});

/// Emoji index with an on-disk cache, exposed over FFI
#[derive(uniffi::Object)]
pub struct EmojiStore {
    index: EmojiIndex,
    cache: Arc<DiskCache>,
}

// Internal implementation (not exported via FFI)
impl EmojiStore {
    pub fn from_config(config: &IndexConfig) -> Result<Self, EmojiIndexError> {
        let cache = Arc::new(match &config.cache_dir {
            Some(dir) => DiskCache::new(dir),
            None => DiskCache::in_memory(),
        });
        let index = EmojiIndex::from_config(config, cache.clone())?;
        Ok(Self { index, cache })
    }

    /// Wrap an already assembled index
    pub fn from_parts(index: EmojiIndex, cache: Arc<DiskCache>) -> Self {
        Self { index, cache }
    }

    pub fn index(&self) -> &EmojiIndex {
        &self.index
    }

    /// The caller's runtime, or the shared fallback
    fn runtime_handle(&self) -> tokio::runtime::Handle {
        tokio::runtime::Handle::try_current()
            .unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
    }

    async fn run<T, F>(&self, work: F) -> Result<T, EmojiIndexError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, EmojiIndexError>> + Send + 'static,
    {
        match self.runtime_handle().spawn(work).await {
            Ok(result) => result,
            // JoinError means the task panicked or was aborted
            Err(_join_error) => Err(EmojiIndexError::Cancelled),
        }
    }

    /// Like `run` for calls that degrade to an empty value instead of failing
    async fn run_or_default<T, F>(&self, work: F) -> T
    where
        T: Default + Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        match self.runtime_handle().spawn(work).await {
            Ok(value) => value,
            Err(join_error) => {
                warn!(error = %join_error, "emoji index task did not complete");
                T::default()
            }
        }
    }
}

// FFI-exported constructors (must be in standalone impl block)
#[uniffi::export]
impl EmojiStore {
    /// Create a store from a TOML configuration document (empty for defaults)
    #[uniffi::constructor]
    pub fn new(config_toml: String) -> Result<Self, EmojiIndexError> {
        let config = IndexConfig::from_toml_str(&config_toml)?;
        Self::from_config(&config)
    }

    /// Create a store with the usual app-container layout
    #[uniffi::constructor]
    pub fn with_directories(
        locale: String,
        cache_dir: String,
        usage_path: Option<String>,
        fallback_dir: Option<String>,
    ) -> Result<Self, EmojiIndexError> {
        let mut config = IndexConfig {
            locale,
            cache_dir: Some(PathBuf::from(cache_dir)),
            ..IndexConfig::default()
        };
        config.usage.store_path = usage_path.map(PathBuf::from);
        config.fallback.directory = fallback_dir.map(PathBuf::from);
        Self::from_config(&config)
    }
}

// State accessors (not on trait, to avoid breaking foreign interface)
#[uniffi::export]
impl EmojiStore {
    pub fn load_state(&self) -> LoadState {
        self.index.load_state()
    }

    pub fn active_source_identifier(&self) -> String {
        self.index.active_source_identifier()
    }

    /// Unix time of the active batch; `None` when serving a fallback file
    pub fn last_updated_unix(&self) -> Option<i64> {
        self.index.last_updated().map(|t| t.timestamp())
    }

    pub fn set_usage_tracking(&self, enabled: bool) {
        self.index.usage().set_enabled(enabled);
    }
}

#[uniffi::export]
#[async_trait::async_trait]
impl EmojiIndexApi for EmojiStore {
    // ─────────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────────

    async fn load(&self) -> Result<(), EmojiIndexError> {
        let index = self.index.clone();
        self.run(async move { Ok(index.load().await?) }).await
    }

    async fn refresh(&self) -> Result<(), EmojiIndexError> {
        let index = self.index.clone();
        self.run(async move { Ok(index.refresh().await?) }).await
    }

    async fn clear_cache_and_reload(&self) -> Result<(), EmojiIndexError> {
        let index = self.index.clone();
        self.run(async move { Ok(index.clear_cache_and_reload().await?) })
            .await
    }

    async fn set_locale(&self, locale: String) -> Result<(), EmojiIndexError> {
        let locale = locale
            .parse()
            .map_err(EmojiIndexError::InvalidConfiguration)?;
        let index = self.index.clone();
        self.run(async move { Ok(index.set_locale(locale).await?) })
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────────

    async fn all_emojis(&self) -> Result<Vec<Emoji>, EmojiIndexError> {
        let index = self.index.clone();
        self.run(async move { Ok(index.all_emojis().await?) }).await
    }

    async fn sections(&self) -> Vec<EmojiSection> {
        let index = self.index.clone();
        self.run_or_default(async move { index.sections().await })
            .await
    }

    async fn categories(&self) -> Vec<EmojiCategory> {
        let index = self.index.clone();
        self.run_or_default(async move { index.categories().await })
            .await
    }

    async fn emoji_for_character(&self, character: String) -> Option<Emoji> {
        let index = self.index.clone();
        self.run_or_default(async move { index.emoji_for_character(&character).await })
            .await
    }

    async fn emoji_for_shortcode(&self, shortcode: String) -> Option<Emoji> {
        let index = self.index.clone();
        self.run_or_default(async move { index.emoji_for_shortcode(&shortcode).await })
            .await
    }

    async fn search(&self, query: String, ranking: SearchRanking) -> Vec<Emoji> {
        let index = self.index.clone();
        self.run_or_default(async move { index.search(&query, ranking).await })
            .await
    }

    async fn favorites(&self) -> Vec<Emoji> {
        let index = self.index.clone();
        self.run_or_default(async move { index.favorites().await })
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────────

    fn record_use(&self, character: String) {
        self.index.record_use(&character);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Cache Management
    // ─────────────────────────────────────────────────────────────────────────────

    async fn cache_entries(&self) -> Result<Vec<CacheEntryInfo>, EmojiIndexError> {
        let cache = Arc::clone(&self.cache);
        self.run(async move { Ok(cache.list_entries().await?) }).await
    }

    async fn cache_size(&self) -> Result<u64, EmojiIndexError> {
        let cache = Arc::clone(&self.cache);
        self.run(async move { Ok(cache.total_size().await?) }).await
    }

    async fn clear_expired_cache(&self, max_age_secs: u64) -> Result<Vec<String>, EmojiIndexError> {
        let cache = Arc::clone(&self.cache);
        self.run(async move {
            Ok(cache
                .clear_expired(Duration::from_secs(max_age_secs))
                .await?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::EmojiIndexApi;
    use crate::models::RawEntry;
    use crate::provider::IndexOptions;
    use crate::source::{write_entries, MemorySource};
    use crate::usage::{UsageConfig, UsageTracker};
    use tempfile::TempDir;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn entries() -> Vec<RawEntry> {
        vec![
            RawEntry::new("😀", "grinning face", "Smileys & Emotion").with_shortcodes(["grinning"]),
            RawEntry::new("😂", "face with tears of joy", "Smileys & Emotion")
                .with_shortcodes(["joy", "laughing"]),
            RawEntry::new("🐶", "dog face", "Animals & Nature").with_shortcodes(["dog"]),
        ]
    }

    fn memory_store(dir: &TempDir) -> EmojiStore {
        let cache = Arc::new(DiskCache::new(dir.path().join("cache")));
        let usage = Arc::new(UsageTracker::in_memory(UsageConfig {
            default_seed: Vec::new(),
            ..UsageConfig::default()
        }));
        let index = EmojiIndex::new(
            Arc::new(MemorySource::new("test", entries())),
            cache.clone(),
            usage,
            IndexOptions::default(),
        );
        EmojiStore::from_parts(index, cache)
    }

    /// Config whose network sources can never answer
    fn offline_toml(dir: &TempDir, with_fallback: bool) -> String {
        let mut toml = String::from(
            "locale = \"en\"\nplatform = \"linux\"\n\n[source]\nemoji_data_url = \"http://127.0.0.1:9/emoji.json\"\nrequest_timeout_secs = 2\n\n[usage]\ndefault_seed = []\n",
        );
        if with_fallback {
            toml.push_str(&format!(
                "\n[fallback]\ndirectory = {:?}\n",
                dir.path().display().to_string()
            ));
        }
        toml
    }

    #[test]
    fn test_store_auto_loads_on_query() {
        let rt = runtime();
        let dir = TempDir::new().unwrap();
        let store = memory_store(&dir);

        assert_eq!(store.load_state(), LoadState::NotLoaded);
        let results = rt.block_on(store.search("face".to_string(), SearchRanking::Relevance));
        assert_eq!(results.len(), 3);
        assert_eq!(store.load_state(), LoadState::Loaded);
        assert_eq!(store.active_source_identifier(), "memory:test");
        assert!(store.last_updated_unix().is_some());
    }

    #[test]
    fn test_lookups_and_sections() {
        let rt = runtime();
        let dir = TempDir::new().unwrap();
        let store = memory_store(&dir);

        let joy = rt.block_on(store.emoji_for_shortcode(":joy:".to_string())).unwrap();
        assert_eq!(joy.character, "😂");
        assert!(rt.block_on(store.emoji_for_character("👽".to_string())).is_none());

        let sections = rt.block_on(store.sections());
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].category, EmojiCategory::SmileysEmotion);
        assert_eq!(
            rt.block_on(store.categories()),
            vec![EmojiCategory::SmileysEmotion, EmojiCategory::AnimalsNature]
        );
    }

    #[test]
    fn test_record_use_drives_favorites() {
        let rt = runtime();
        let dir = TempDir::new().unwrap();
        let store = memory_store(&dir);

        store.record_use("🐶".to_string());
        store.record_use("🐶".to_string());
        store.record_use("😀".to_string());
        let favorites = rt.block_on(store.favorites());
        let ids: Vec<&str> = favorites.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["🐶", "😀"]);

        store.set_usage_tracking(false);
        assert!(rt.block_on(store.favorites()).is_empty());
    }

    #[test]
    fn test_cache_management() {
        let rt = runtime();
        let dir = TempDir::new().unwrap();
        let store = memory_store(&dir);

        rt.block_on(store.load()).unwrap();
        let entries = rt.block_on(store.cache_entries()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].identifier, "memory:test");
        assert_eq!(entries[0].entry_count, 3);
        assert!(rt.block_on(store.cache_size()).unwrap() > 0);

        let removed = rt.block_on(store.clear_expired_cache(3600)).unwrap();
        assert!(removed.is_empty());
        let removed = rt.block_on(store.clear_expired_cache(0));
        // Age is reported in whole seconds, so a just-written entry is not yet expired
        assert!(removed.unwrap().is_empty());
    }

    #[test]
    fn test_fallback_runtime_outside_tokio() {
        let dir = TempDir::new().unwrap();
        let store = memory_store(&dir);
        // No runtime on this thread: the store must bring its own
        futures::executor::block_on(store.load()).unwrap();
        let all = futures::executor::block_on(store.all_emojis()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_offline_store_serves_fallback() {
        let rt = runtime();
        let dir = TempDir::new().unwrap();
        rt.block_on(write_entries(
            &dir.path().join("emoji-fallback-en.json"),
            &entries(),
            false,
        ))
        .unwrap();

        let store = EmojiStore::new(offline_toml(&dir, true)).unwrap();
        assert_eq!(store.active_source_identifier(), "emoji-data-google");
        let grin = rt.block_on(store.emoji_for_shortcode("grinning".to_string()));
        assert_eq!(grin.unwrap().character, "😀");
        assert!(store.last_updated_unix().is_none());
    }

    #[test]
    fn test_offline_store_without_fallback_fails() {
        let rt = runtime();
        let dir = TempDir::new().unwrap();
        let store = EmojiStore::new(offline_toml(&dir, false)).unwrap();

        let result = rt.block_on(store.all_emojis());
        assert!(matches!(result, Err(EmojiIndexError::NoDataAvailable(_))));
        assert!(rt.block_on(store.search("face".to_string(), SearchRanking::Relevance)).is_empty());
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            EmojiStore::new("locale = [".to_string()),
            Err(EmojiIndexError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            EmojiStore::new("locale = \"?\"".to_string()),
            Err(EmojiIndexError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            EmojiStore::new("[source]\nemoji_data_url = \"nope\"".to_string()),
            Err(EmojiIndexError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_set_locale_rejects_garbage() {
        let rt = runtime();
        let dir = TempDir::new().unwrap();
        let store = EmojiStore::new(offline_toml(&dir, false)).unwrap();
        let result = rt.block_on(store.set_locale("!".to_string()));
        assert!(matches!(result, Err(EmojiIndexError::InvalidConfiguration(_))));
    }
}
