//! EmojiIndex - load pipeline, index swap and query surface
//!
//! Load order on first access:
//! 1. cached batch for the active source (background refresh when stale)
//! 2. fallback file (always followed by a background refresh)
//! 3. synchronous fetch, the only path that can fail the load
//!
//! Concurrency Model:
//! - All index fields live in one `IndexState` behind a single mutex; new
//!   catalogs are built off-lock and swapped in one step
//! - The load pipeline is serialized by an async mutex; explicit refreshes
//!   are not, concurrent refreshes are last-write-wins
//! - Every refresh carries the source generation it was launched under and is
//!   discarded if a locale switch or cache clear bumped it meanwhile

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::{Cache, CacheError};
use crate::catalog::CatalogIndex;
use crate::config::{ConfigError, IndexConfig};
use crate::fallback::{load_fallback, FallbackConfig};
use crate::interface::{Emoji, EmojiCategory, EmojiSection, LoadState, SearchRanking};
use crate::locale::{resolve_source, Locale};
use crate::search::{search, SearchConfig};
use crate::source::{DataSource, SourceError, SourceResult};
use crate::usage::UsageTracker;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no emoji data available for {source_id}: {cause}")]
    NoDataAvailable {
        source_id: String,
        #[source]
        cause: Box<IndexError>,
    },
    #[error("locale switching needs a source resolver")]
    NoResolver,
}

pub type IndexResult<T> = Result<T, IndexError>;

/// Maps a locale to the data source that serves it
pub type SourceResolver =
    Arc<dyn Fn(&Locale) -> SourceResult<Arc<dyn DataSource>> + Send + Sync>;

pub struct IndexOptions {
    pub locale: Locale,
    pub fallback: FallbackConfig,
    pub search: SearchConfig,
    /// Required for `set_locale`
    pub resolver: Option<SourceResolver>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            locale: Locale::english(),
            fallback: FallbackConfig::default(),
            search: SearchConfig::default(),
            resolver: None,
        }
    }
}

struct IndexState {
    source: Arc<dyn DataSource>,
    locale: Locale,
    /// Bumped whenever the active source or its cache is reset
    generation: u64,
    catalog: Arc<CatalogIndex>,
    last_updated: Option<DateTime<Utc>>,
    load_state: LoadState,
}

impl IndexState {
    fn reset(&mut self) {
        self.generation += 1;
        self.catalog = Arc::new(CatalogIndex::default());
        self.last_updated = None;
        self.load_state = LoadState::NotLoaded;
    }
}

struct Inner {
    cache: Arc<dyn Cache>,
    usage: Arc<UsageTracker>,
    fallback: FallbackConfig,
    search: SearchConfig,
    resolver: Option<SourceResolver>,
    state: Mutex<IndexState>,
    load_lock: tokio::sync::Mutex<()>,
    revision: watch::Sender<u64>,
}

/// Shared handle to one emoji index. Clones share state.
#[derive(Clone)]
pub struct EmojiIndex {
    inner: Arc<Inner>,
}

impl EmojiIndex {
    pub fn new(
        source: Arc<dyn DataSource>,
        cache: Arc<dyn Cache>,
        usage: Arc<UsageTracker>,
        options: IndexOptions,
    ) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                cache,
                usage,
                fallback: options.fallback,
                search: options.search,
                resolver: options.resolver,
                state: Mutex::new(IndexState {
                    source,
                    locale: options.locale,
                    generation: 0,
                    catalog: Arc::new(CatalogIndex::default()),
                    last_updated: None,
                    load_state: LoadState::NotLoaded,
                }),
                load_lock: tokio::sync::Mutex::new(()),
                revision,
            }),
        }
    }

    /// Assemble an index from configuration, resolving the configured locale
    pub fn from_config(config: &IndexConfig, cache: Arc<dyn Cache>) -> IndexResult<Self> {
        let locale = config.parsed_locale()?;
        let platform = config.platform;
        let source_config = config.source.clone();
        let resolver: SourceResolver =
            Arc::new(move |locale: &Locale| resolve_source(locale, platform, &source_config));

        let source = resolver(&locale)?;
        let usage = Arc::new(UsageTracker::new(config.usage.clone()));
        Ok(Self::new(
            source,
            cache,
            usage,
            IndexOptions {
                locale,
                fallback: config.fallback.clone(),
                search: config.search.clone(),
                resolver: Some(resolver),
            },
        ))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // State
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn load_state(&self) -> LoadState {
        self.inner.state.lock().load_state
    }

    /// When the active batch was fetched; `None` when serving a fallback file
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().last_updated
    }

    pub fn active_source_identifier(&self) -> String {
        self.inner.state.lock().source.identifier()
    }

    pub fn locale(&self) -> Locale {
        self.inner.state.lock().locale.clone()
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.inner.usage
    }

    /// Receives a new revision after every index swap or reset
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Current catalog snapshot; never blocks on a load
    pub fn catalog(&self) -> Arc<CatalogIndex> {
        Arc::clone(&self.inner.state.lock().catalog)
    }

    fn notify(&self) {
        self.inner.revision.send_modify(|revision| *revision += 1);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.state.lock().generation == generation
    }

    /// Swap in a built catalog if `generation` is still active
    fn install(
        &self,
        generation: u64,
        catalog: CatalogIndex,
        last_updated: Option<DateTime<Utc>>,
    ) -> bool {
        let installed = {
            let mut state = self.inner.state.lock();
            if state.generation != generation {
                false
            } else {
                state.catalog = Arc::new(catalog);
                state.last_updated = last_updated;
                state.load_state = LoadState::Loaded;
                true
            }
        };
        if installed {
            self.notify();
        }
        installed
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────────

    /// Run the load pipeline. A no-op once loaded.
    pub async fn load(&self) -> IndexResult<()> {
        if self.load_state() == LoadState::Loaded {
            return Ok(());
        }
        let _pipeline = self.inner.load_lock.lock().await;

        let (source, locale, generation) = {
            let mut state = self.inner.state.lock();
            if state.load_state == LoadState::Loaded {
                return Ok(());
            }
            state.load_state = LoadState::Loading;
            (Arc::clone(&state.source), state.locale.clone(), state.generation)
        };

        let result = self.run_pipeline(source, &locale, generation).await;
        if result.is_err() {
            let mut state = self.inner.state.lock();
            if state.generation == generation && state.load_state == LoadState::Loading {
                state.load_state = LoadState::NotLoaded;
            }
        }
        result
    }

    async fn run_pipeline(
        &self,
        source: Arc<dyn DataSource>,
        locale: &Locale,
        generation: u64,
    ) -> IndexResult<()> {
        let source_id = source.identifier();

        match self.inner.cache.load(&source_id).await {
            Ok(Some(batch)) => {
                let catalog = CatalogIndex::build(&batch.entries);
                if catalog.is_empty() {
                    warn!(source = %source_id, "cached batch has no usable entries");
                } else {
                    let stale = batch.age() > source.refresh_interval();
                    info!(source = %source_id, entries = catalog.len(), stale, "loaded index from cache");
                    self.install(generation, catalog, Some(batch.last_updated));
                    if stale {
                        self.spawn_refresh(source, generation);
                    }
                    return Ok(());
                }
            }
            Ok(None) => debug!(source = %source_id, "cache miss"),
            Err(e) => warn!(source = %source_id, error = %e, "cache unreadable, trying fallback"),
        }

        match load_fallback(&self.inner.fallback, locale).await {
            Ok(Some((path, entries))) => {
                let catalog = CatalogIndex::build(&entries);
                if catalog.is_empty() {
                    warn!(path = %path.display(), "fallback file has no usable entries");
                } else {
                    info!(path = %path.display(), entries = catalog.len(), "loaded index from fallback file");
                    self.install(generation, catalog, None);
                    self.spawn_refresh(source, generation);
                    return Ok(());
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "fallback file unreadable, fetching"),
        }

        self.refresh_generation(source, generation)
            .await
            .map_err(|cause| IndexError::NoDataAvailable {
                source_id,
                cause: Box::new(cause),
            })
    }

    /// Fetch from the active source, persist, and swap in the new index.
    /// On failure the current index keeps serving.
    pub async fn refresh(&self) -> IndexResult<()> {
        let (source, generation) = {
            let state = self.inner.state.lock();
            (Arc::clone(&state.source), state.generation)
        };
        self.refresh_generation(source, generation).await
    }

    async fn refresh_generation(
        &self,
        source: Arc<dyn DataSource>,
        generation: u64,
    ) -> IndexResult<()> {
        let source_id = source.identifier();
        let entries = source.fetch().await?;
        if !self.is_current(generation) {
            debug!(source = %source_id, "discarding refresh for a superseded source");
            return Ok(());
        }

        let catalog = CatalogIndex::build(&entries);
        if catalog.is_empty() {
            return Err(SourceError::EmptyData(source_id).into());
        }

        // A batch that cannot be persisted still serves this session
        if let Err(e) = self.inner.cache.save(&entries, &source_id).await {
            warn!(source = %source_id, error = %e, "failed to cache fetched batch");
        }

        let entries = catalog.len();
        if self.install(generation, catalog, Some(Utc::now())) {
            info!(source = %source_id, entries, "index refreshed");
        } else {
            debug!(source = %source_id, "discarding refresh for a superseded source");
        }
        Ok(())
    }

    fn spawn_refresh(&self, source: Arc<dyn DataSource>, generation: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime, skipping background refresh");
            return;
        };
        let index = self.clone();
        handle.spawn(async move {
            if let Err(e) = index.refresh_generation(source, generation).await {
                warn!(error = %e, "background refresh failed");
            }
        });
    }

    /// Drop the active source's cached batch and reload from scratch
    pub async fn clear_cache_and_reload(&self) -> IndexResult<()> {
        let source_id = {
            let mut state = self.inner.state.lock();
            state.reset();
            state.source.identifier()
        };
        self.notify();
        self.inner.cache.clear(&source_id).await?;
        self.load().await
    }

    /// Swap the active source and reload under its cache namespace
    pub async fn replace_source(&self, source: Arc<dyn DataSource>) -> IndexResult<()> {
        {
            let mut state = self.inner.state.lock();
            state.reset();
            state.source = source;
        }
        self.notify();
        self.load().await
    }

    /// Resolve a source for `locale` and switch to it
    pub async fn set_locale(&self, locale: Locale) -> IndexResult<()> {
        let resolver = self.inner.resolver.as_ref().ok_or(IndexError::NoResolver)?;
        let source = resolver(&locale)?;
        info!(locale = %locale, source = %source.identifier(), "switching locale");
        {
            let mut state = self.inner.state.lock();
            state.reset();
            state.source = source;
            state.locale = locale;
        }
        self.notify();
        self.load().await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────────

    /// Load if needed; failures leave an empty catalog
    async fn loaded_catalog(&self) -> Arc<CatalogIndex> {
        if let Err(e) = self.load().await {
            debug!(error = %e, "serving empty catalog");
        }
        self.catalog()
    }

    /// Surfaces the load error when nothing could be loaded
    pub async fn all_emojis(&self) -> IndexResult<Vec<Emoji>> {
        self.load().await?;
        Ok(self.catalog().emojis().to_vec())
    }

    pub async fn sections(&self) -> Vec<EmojiSection> {
        self.loaded_catalog().await.sections()
    }

    pub async fn categories(&self) -> Vec<EmojiCategory> {
        self.loaded_catalog().await.categories()
    }

    pub async fn emoji_for_character(&self, character: &str) -> Option<Emoji> {
        self.loaded_catalog().await.by_character(character).cloned()
    }

    pub async fn emoji_for_shortcode(&self, shortcode: &str) -> Option<Emoji> {
        self.loaded_catalog().await.by_shortcode(shortcode).cloned()
    }

    pub async fn search(&self, query: &str, ranking: SearchRanking) -> Vec<Emoji> {
        let catalog = self.loaded_catalog().await;
        let usage = &self.inner.usage;
        search(
            &catalog,
            query,
            ranking,
            |character| usage.score(character),
            &self.inner.search,
        )
    }

    /// Favorite characters resolved against the current catalog
    pub async fn favorites(&self) -> Vec<Emoji> {
        let catalog = self.loaded_catalog().await;
        let favorites = self.inner.usage.favorites();
        catalog.resolve(favorites.iter().map(String::as_str))
    }

    pub fn record_use(&self, character: &str) {
        self.inner.usage.record_use(character);
    }
}

impl std::fmt::Debug for EmojiIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("EmojiIndex")
            .field("source", &state.source.identifier())
            .field("locale", &state.locale.to_string())
            .field("load_state", &state.load_state)
            .field("entries", &state.catalog.len())
            .finish()
    }
}
