//! Composite source merging a localization source into an ordering source.
//!
//! Roles are fixed: the *secondary* source is the base. It supplies output
//! order, shortcodes and category. The *primary* source supplies the display
//! name. Keywords are the union of both and skin-tone support is OR-ed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{ensure_not_empty, DataSource, SourceResult};
use crate::models::{union_preserving_order, RawEntry, UNKNOWN_CATEGORY};

/// Fetches both sources concurrently and blends the results.
/// Either fetch failing fails the blend; there is no partial result.
#[derive(Debug, Clone)]
pub struct Blender {
    primary: Arc<dyn DataSource>,
    secondary: Arc<dyn DataSource>,
}

impl Blender {
    /// `primary` provides localized names, `secondary` provides order and shortcodes
    pub fn new(primary: Arc<dyn DataSource>, secondary: Arc<dyn DataSource>) -> Self {
        Self { primary, secondary }
    }

    pub fn primary(&self) -> &Arc<dyn DataSource> {
        &self.primary
    }

    pub fn secondary(&self) -> &Arc<dyn DataSource> {
        &self.secondary
    }
}

#[async_trait]
impl DataSource for Blender {
    fn identifier(&self) -> String {
        format!(
            "blend:{}+{}",
            self.primary.identifier(),
            self.secondary.identifier()
        )
    }

    fn refresh_interval(&self) -> Duration {
        self.primary
            .refresh_interval()
            .min(self.secondary.refresh_interval())
    }

    async fn fetch(&self) -> SourceResult<Vec<RawEntry>> {
        let (primary, secondary) =
            futures::try_join!(self.primary.fetch(), self.secondary.fetch())?;
        debug!(
            primary = primary.len(),
            secondary = secondary.len(),
            "blending source batches"
        );
        ensure_not_empty(&self.identifier(), blend(primary, secondary))
    }
}

/// Merge two batches.
///
/// Output order: every secondary character in secondary order (merged with its
/// primary counterpart when one exists), then primary-only characters in
/// primary order. No character appears twice; the first occurrence wins.
pub fn blend(primary: Vec<RawEntry>, secondary: Vec<RawEntry>) -> Vec<RawEntry> {
    let mut primary_order = Vec::with_capacity(primary.len());
    let mut localized: HashMap<String, RawEntry> = HashMap::with_capacity(primary.len());
    for entry in primary {
        if !localized.contains_key(&entry.character) {
            primary_order.push(entry.character.clone());
            localized.insert(entry.character.clone(), entry);
        }
    }

    let mut emitted = std::collections::HashSet::with_capacity(secondary.len() + primary_order.len());
    let mut blended = Vec::with_capacity(secondary.len() + primary_order.len());

    for base in secondary {
        if !emitted.insert(base.character.clone()) {
            continue;
        }
        match localized.remove(&base.character) {
            Some(name_source) => blended.push(merge(base, name_source)),
            None => blended.push(base),
        }
    }

    for character in primary_order {
        if let Some(entry) = localized.remove(&character) {
            if emitted.insert(character) {
                blended.push(entry);
            }
        }
    }

    blended
}

fn merge(base: RawEntry, localized: RawEntry) -> RawEntry {
    let name = if localized.name.trim().is_empty() {
        base.name
    } else {
        localized.name
    };

    let category = if base.category.trim().is_empty() || base.category == UNKNOWN_CATEGORY {
        localized.category
    } else {
        base.category
    };

    let shortcodes = if base.shortcodes.is_empty() {
        localized.shortcodes
    } else {
        base.shortcodes
    };

    let mut keywords = base.keywords;
    union_preserving_order(&mut keywords, localized.keywords);

    RawEntry {
        character: base.character,
        name,
        category,
        shortcodes,
        keywords,
        supports_skin_tone: base.supports_skin_tone || localized.supports_skin_tone,
    }
}
