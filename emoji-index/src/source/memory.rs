use std::time::Duration;

use async_trait::async_trait;

use super::{ensure_not_empty, DataSource, SourceError, SourceResult, DEFAULT_REFRESH_INTERVAL};
use crate::models::RawEntry;

/// Serves a fixed batch. Used for embedding, benchmarks and tests.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    entries: Vec<RawEntry>,
    refresh_interval: Duration,
    unavailable: bool,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, entries: Vec<RawEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            unavailable: false,
        }
    }

    /// A source whose every fetch fails with `Unavailable`
    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            unavailable: true,
            ..Self::new(name, Vec::new())
        }
    }

    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }
}

#[async_trait]
impl DataSource for MemorySource {
    fn identifier(&self) -> String {
        format!("memory:{}", self.name)
    }

    fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    async fn fetch(&self) -> SourceResult<Vec<RawEntry>> {
        if self.unavailable {
            return Err(SourceError::Unavailable {
                source_id: self.identifier(),
                reason: "configured to fail".to_string(),
            });
        }
        ensure_not_empty(&self.identifier(), self.entries.clone())
    }
}
