//! Localized-name source backed by `emojibase-data`.
//!
//! Reads `{base}/{locale}/data.json` and, when enabled,
//! `{base}/{locale}/shortcodes/cldr.json`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{
    ensure_not_empty, get_json, http_client, parse_url, DataSource, SourceError, SourceResult,
    DEFAULT_REFRESH_INTERVAL, DEFAULT_REQUEST_TIMEOUT,
};
use crate::interface::EmojiCategory;
use crate::models::{RawEntry, UNKNOWN_CATEGORY};

pub const DEFAULT_EMOJIBASE_URL: &str = "https://cdn.jsdelivr.net/npm/emojibase-data@latest";

/// Locales published by emojibase-data
pub const EMOJIBASE_LOCALES: &[&str] = &[
    "bn", "da", "de", "en", "en-gb", "es", "es-mx", "et", "fi", "fr", "hi", "hu", "it", "ja",
    "ko", "lt", "ms", "nb", "nl", "pl", "pt", "ru", "sv", "th", "uk", "zh", "zh-hant",
];

#[derive(Debug, Deserialize)]
struct CompactEmoji {
    #[serde(default)]
    label: String,
    hexcode: String,
    emoji: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    group: Option<u8>,
    #[serde(default)]
    order: Option<u32>,
    #[serde(default)]
    skins: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ShortcodeValue {
    One(String),
    Many(Vec<String>),
}

impl ShortcodeValue {
    fn into_vec(self) -> Vec<String> {
        match self {
            ShortcodeValue::One(s) => vec![s],
            ShortcodeValue::Many(v) => v,
        }
    }
}

/// Emojibase group index to category name. Group 2 holds skin-tone
/// components, which have no category of their own.
fn group_category(group: Option<u8>) -> &'static str {
    let category = match group {
        Some(0) => EmojiCategory::SmileysEmotion,
        Some(1) => EmojiCategory::PeopleBody,
        Some(3) => EmojiCategory::AnimalsNature,
        Some(4) => EmojiCategory::FoodDrink,
        Some(5) => EmojiCategory::TravelPlaces,
        Some(6) => EmojiCategory::Activities,
        Some(7) => EmojiCategory::Objects,
        Some(8) => EmojiCategory::Symbols,
        Some(9) => EmojiCategory::Flags,
        Some(2) => return "Component",
        _ => return UNKNOWN_CATEGORY,
    };
    category.display_name()
}

#[derive(Debug, Clone)]
pub struct EmojibaseSource {
    base_url: Url,
    locale: String,
    include_shortcodes: bool,
    timeout: Duration,
    refresh_interval: Duration,
}

impl EmojibaseSource {
    pub fn new(base_url: &str, locale: &str) -> SourceResult<Self> {
        let locale = locale.to_lowercase();
        if !EMOJIBASE_LOCALES.contains(&locale.as_str()) {
            return Err(SourceError::Unavailable {
                source_id: format!("emojibase-{locale}"),
                reason: "locale not published by emojibase".to_string(),
            });
        }
        let mut base = base_url.trim_end_matches('/').to_string();
        base.push('/');
        Ok(Self {
            base_url: parse_url(&base)?,
            locale,
            include_shortcodes: false,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        })
    }

    /// Also fetch the locale's CLDR shortcodes
    pub fn with_shortcodes(mut self, include: bool) -> Self {
        self.include_shortcodes = include;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    fn join(&self, path: &str) -> SourceResult<Url> {
        self.base_url
            .join(&format!("{}/{}", self.locale, path))
            .map_err(|e| SourceError::InvalidUrl {
                url: format!("{}{}/{}", self.base_url, self.locale, path),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl DataSource for EmojibaseSource {
    fn identifier(&self) -> String {
        if self.include_shortcodes {
            format!("emojibase-{}-cldr", self.locale)
        } else {
            format!("emojibase-{}", self.locale)
        }
    }

    fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    async fn fetch(&self) -> SourceResult<Vec<RawEntry>> {
        let client = http_client(self.timeout)?;
        let data_url = self.join("data.json")?;

        let (records, shortcodes) = if self.include_shortcodes {
            let shortcodes_url = self.join("shortcodes/cldr.json")?;
            let (records, shortcodes) = futures::try_join!(
                get_json::<Vec<CompactEmoji>>(&client, &data_url),
                get_json::<HashMap<String, ShortcodeValue>>(&client, &shortcodes_url),
            )?;
            (records, shortcodes)
        } else {
            (get_json::<Vec<CompactEmoji>>(&client, &data_url).await?, HashMap::new())
        };

        let entries = convert_records(records, shortcodes);
        debug!(source = %self.identifier(), entries = entries.len(), "fetched emojibase data");
        ensure_not_empty(&self.identifier(), entries)
    }
}

fn convert_records(
    mut records: Vec<CompactEmoji>,
    mut shortcodes: HashMap<String, ShortcodeValue>,
) -> Vec<RawEntry> {
    // Records without an order go last, keeping their relative order
    records.sort_by_key(|r| r.order.unwrap_or(u32::MAX));
    records
        .into_iter()
        .filter(|r| !r.emoji.is_empty())
        .map(|r| RawEntry {
            shortcodes: shortcodes
                .remove(&r.hexcode)
                .map(ShortcodeValue::into_vec)
                .unwrap_or_default(),
            category: group_category(r.group).to_string(),
            supports_skin_tone: r.skins.map(|s| !s.is_empty()).unwrap_or(false),
            character: r.emoji,
            name: r.label,
            keywords: r.tags,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = r#"[
        {"label":"Gesicht mit Freudentränen","hexcode":"1F602","emoji":"😂",
         "tags":["freude","gesicht"],"group":0,"order":8},
        {"label":"grinsendes Gesicht","hexcode":"1F600","emoji":"😀",
         "tags":["gesicht","grinsen"],"group":0,"order":1},
        {"label":"winkende Hand","hexcode":"1F44B","emoji":"👋","group":1,"order":150,
         "skins":[{"hexcode":"1F44B-1F3FB","emoji":"👋🏻"}]},
        {"label":"Regionalindikator A","hexcode":"1F1E6","emoji":"🇦"},
        {"label":"helle Hautfarbe","hexcode":"1F3FB","emoji":"🏻","group":2,"order":9000}
    ]"#;

    #[test]
    fn test_convert_orders_and_maps_groups() {
        let records: Vec<CompactEmoji> = serde_json::from_str(DATA).unwrap();
        let entries = convert_records(records, HashMap::new());

        let characters: Vec<&str> = entries.iter().map(|e| e.character.as_str()).collect();
        assert_eq!(characters, vec!["😀", "😂", "👋", "🏻", "🇦"]);
        assert_eq!(entries[0].category, "Smileys & Emotion");
        assert_eq!(entries[2].category, "People & Body");
        assert!(entries[2].supports_skin_tone);
        assert_eq!(entries[3].category, "Component");
        assert_eq!(entries[4].category, UNKNOWN_CATEGORY);
        assert_eq!(entries[0].name, "grinsendes Gesicht");
        assert_eq!(entries[0].keywords, vec!["gesicht", "grinsen"]);
    }

    #[test]
    fn test_convert_attaches_shortcodes() {
        let records: Vec<CompactEmoji> = serde_json::from_str(DATA).unwrap();
        let shortcodes: HashMap<String, ShortcodeValue> =
            serde_json::from_str(r#"{"1F600":"grinsen","1F602":["freudentränen","lachen"]}"#)
                .unwrap();
        let entries = convert_records(records, shortcodes);

        assert_eq!(entries[0].shortcodes, vec!["grinsen"]);
        assert_eq!(entries[1].shortcodes, vec!["freudentränen", "lachen"]);
        assert!(entries[2].shortcodes.is_empty());
    }

    #[test]
    fn test_identifier_and_urls() {
        let source = EmojibaseSource::new("https://cdn.example.com/emojibase/", "DE").unwrap();
        assert_eq!(source.identifier(), "emojibase-de");
        assert_eq!(
            source.join("data.json").unwrap().as_str(),
            "https://cdn.example.com/emojibase/de/data.json"
        );

        let source = source.with_shortcodes(true);
        assert_eq!(source.identifier(), "emojibase-de-cldr");
        assert_eq!(
            source.join("shortcodes/cldr.json").unwrap().as_str(),
            "https://cdn.example.com/emojibase/de/shortcodes/cldr.json"
        );
    }

    #[test]
    fn test_unsupported_locale_is_unavailable() {
        assert!(matches!(
            EmojibaseSource::new(DEFAULT_EMOJIBASE_URL, "tlh"),
            Err(SourceError::Unavailable { .. })
        ));
    }
}
