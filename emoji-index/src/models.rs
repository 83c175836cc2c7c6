//! Core data models for the emoji index
//!
//! `RawEntry` is the wire and storage format every source produces and every
//! cache or fallback file contains. `Emoji` (in `interface`) is the validated
//! form exposed to the UI.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::interface::{Emoji, EmojiCategory};

/// Category string used by sources that could not classify an entry
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Source-agnostic, pre-validation emoji record.
///
/// JSON shape (one element of a cache or fallback file):
/// ```json
/// {"character":"😀","name":"grinning face","category":"Smileys & Emotion",
///  "shortcodes":["grinning"],"keywords":["face","grin"],"supportsSkinTone":false}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntry {
    pub character: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub shortcodes: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub supports_skin_tone: bool,
}

impl RawEntry {
    pub fn new(
        character: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            character: character.into(),
            name: name.into(),
            category: category.into(),
            shortcodes: Vec::new(),
            keywords: Vec::new(),
            supports_skin_tone: false,
        }
    }

    pub fn with_shortcodes<I, S>(mut self, shortcodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shortcodes = shortcodes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_skin_tone(mut self, supports_skin_tone: bool) -> Self {
        self.supports_skin_tone = supports_skin_tone;
        self
    }

    /// Resolve into an `Emoji`. Entries with an empty character or a category
    /// outside the nine known ones are dropped.
    pub fn to_emoji(&self) -> Option<Emoji> {
        if self.character.is_empty() {
            return None;
        }
        let category = resolve_category(&self.category)?;
        Some(Emoji {
            character: self.character.clone(),
            name: self.name.clone(),
            category,
            raw_category: self.category.clone(),
            shortcodes: self.shortcodes.clone(),
            keywords: self.keywords.clone(),
            supports_skin_tone: self.supports_skin_tone,
        })
    }
}

/// Map a free-form source category onto one of the fixed categories.
///
/// Accepts the current Unicode group names plus the older short forms some
/// feeds still use ("Activity", "Foods", "Places", "Smileys & People").
pub fn resolve_category(raw: &str) -> Option<EmojiCategory> {
    let normalized: String = raw
        .to_lowercase()
        .replace(" and ", "&")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let category = match normalized.as_str() {
        "smileys&emotion" | "smileys&people" | "smileys" => EmojiCategory::SmileysEmotion,
        "people&body" | "people" => EmojiCategory::PeopleBody,
        "animals&nature" | "animals" | "nature" => EmojiCategory::AnimalsNature,
        "food&drink" | "food" | "foods" => EmojiCategory::FoodDrink,
        "travel&places" | "travel" | "places" => EmojiCategory::TravelPlaces,
        "activities" | "activity" => EmojiCategory::Activities,
        "objects" => EmojiCategory::Objects,
        "symbols" => EmojiCategory::Symbols,
        "flags" => EmojiCategory::Flags,
        _ => return None,
    };
    Some(category)
}

/// Append `extra` to `base`, skipping values already present. Order is kept.
pub(crate) fn union_preserving_order(base: &mut Vec<String>, extra: impl IntoIterator<Item = String>) {
    let mut seen: HashSet<String> = base.iter().cloned().collect();
    for value in extra {
        if seen.insert(value.clone()) {
            base.push(value);
        }
    }
}
