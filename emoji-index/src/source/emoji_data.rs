//! Canonical-order source backed by the `emoji-datasource` JSON feed.
//!
//! Each feed record looks like:
//! ```json
//! {"name":"GRINNING FACE","unified":"1F600","short_names":["grinning"],
//!  "category":"Smileys & Emotion","subcategory":"face-smiling","sort_order":1,
//!  "has_img_apple":true,"has_img_google":true,"skin_variations":null}
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{
    ensure_not_empty, get_json, hexcode_to_string, http_client, parse_url, DataSource,
    SourceResult, DEFAULT_REFRESH_INTERVAL, DEFAULT_REQUEST_TIMEOUT,
};
use crate::models::{union_preserving_order, RawEntry, UNKNOWN_CATEGORY};

pub const DEFAULT_EMOJI_DATA_URL: &str =
    "https://cdn.jsdelivr.net/npm/emoji-datasource@latest/emoji.json";

/// Image set whose coverage decides which glyphs are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageVendor {
    #[default]
    Apple,
    Google,
    Twitter,
    Facebook,
}

impl ImageVendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageVendor::Apple => "apple",
            ImageVendor::Google => "google",
            ImageVendor::Twitter => "twitter",
            ImageVendor::Facebook => "facebook",
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeedRecord {
    #[serde(default)]
    name: Option<String>,
    unified: String,
    #[serde(default)]
    short_names: Vec<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    subcategory: Option<String>,
    #[serde(default)]
    sort_order: u32,
    #[serde(default)]
    has_img_apple: bool,
    #[serde(default)]
    has_img_google: bool,
    #[serde(default)]
    has_img_twitter: bool,
    #[serde(default)]
    has_img_facebook: bool,
    #[serde(default)]
    skin_variations: Option<HashMap<String, serde_json::Value>>,
}

impl FeedRecord {
    fn has_image(&self, vendor: ImageVendor) -> bool {
        match vendor {
            ImageVendor::Apple => self.has_img_apple,
            ImageVendor::Google => self.has_img_google,
            ImageVendor::Twitter => self.has_img_twitter,
            ImageVendor::Facebook => self.has_img_facebook,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmojiDataSource {
    url: Url,
    vendor: ImageVendor,
    timeout: Duration,
    refresh_interval: Duration,
}

impl EmojiDataSource {
    pub fn new(url: &str, vendor: ImageVendor) -> SourceResult<Self> {
        Ok(Self {
            url: parse_url(url)?,
            vendor,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    pub fn vendor(&self) -> ImageVendor {
        self.vendor
    }
}

#[async_trait]
impl DataSource for EmojiDataSource {
    fn identifier(&self) -> String {
        format!("emoji-data-{}", self.vendor.as_str())
    }

    fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    async fn fetch(&self) -> SourceResult<Vec<RawEntry>> {
        let client = http_client(self.timeout)?;
        let records: Vec<FeedRecord> = get_json(&client, &self.url).await?;
        let total = records.len();
        let entries = convert_records(records, self.vendor);
        debug!(
            source = %self.identifier(),
            total,
            kept = entries.len(),
            "fetched emoji-data feed"
        );
        ensure_not_empty(&self.identifier(), entries)
    }
}

/// Keep glyphs the vendor renders, in feed `sort_order`
fn convert_records(mut records: Vec<FeedRecord>, vendor: ImageVendor) -> Vec<RawEntry> {
    records.sort_by_key(|r| r.sort_order);
    records
        .into_iter()
        .filter(|r| r.has_image(vendor))
        .filter_map(convert_record)
        .collect()
}

fn convert_record(record: FeedRecord) -> Option<RawEntry> {
    let character = hexcode_to_string(&record.unified)?;

    let name = record
        .name
        .as_deref()
        .map(str::to_lowercase)
        .filter(|n| !n.is_empty())
        .or_else(|| record.short_names.first().map(|s| s.replace('_', " ")))
        .unwrap_or_default();

    let mut keywords: Vec<String> = Vec::new();
    union_preserving_order(
        &mut keywords,
        record
            .short_names
            .iter()
            .flat_map(|s| s.split('_'))
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase),
    );
    if let Some(subcategory) = &record.subcategory {
        union_preserving_order(
            &mut keywords,
            subcategory
                .split('-')
                .filter(|w| !w.is_empty())
                .map(str::to_lowercase),
        );
    }

    Some(RawEntry {
        character,
        name,
        category: record
            .category
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
        shortcodes: record.short_names,
        keywords,
        supports_skin_tone: record
            .skin_variations
            .map(|v| !v.is_empty())
            .unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"[
        {"name":"FACE WITH TEARS OF JOY","unified":"1F602","short_names":["joy"],
         "category":"Smileys & Emotion","subcategory":"face-smiling","sort_order":8,
         "has_img_apple":true,"has_img_google":true},
        {"name":"GRINNING FACE","unified":"1F600","short_names":["grinning"],
         "category":"Smileys & Emotion","subcategory":"face-smiling","sort_order":1,
         "has_img_apple":true,"has_img_google":true},
        {"name":"WAVING HAND SIGN","unified":"1F44B","short_names":["wave"],
         "category":"People & Body","subcategory":"hand-fingers-open","sort_order":150,
         "has_img_apple":true,"has_img_google":false,
         "skin_variations":{"1F3FB":{"unified":"1F44B-1F3FB"}}},
        {"name":null,"unified":"1F3F3-FE0F-200D-26A7-FE0F","short_names":["transgender_flag"],
         "sort_order":1500,"has_img_apple":true,"has_img_google":true}
    ]"#;

    fn records() -> Vec<FeedRecord> {
        serde_json::from_str(FEED).unwrap()
    }

    #[test]
    fn test_convert_sorts_by_sort_order() {
        let entries = convert_records(records(), ImageVendor::Apple);
        let characters: Vec<&str> = entries.iter().map(|e| e.character.as_str()).collect();
        assert_eq!(characters[..3], ["😀", "😂", "👋"]);
    }

    #[test]
    fn test_convert_filters_by_vendor() {
        let entries = convert_records(records(), ImageVendor::Google);
        assert!(entries.iter().all(|e| e.character != "👋"));
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_convert_record_fields() {
        let entries = convert_records(records(), ImageVendor::Apple);
        let wave = entries.iter().find(|e| e.character == "👋").unwrap();
        assert_eq!(wave.name, "waving hand sign");
        assert_eq!(wave.category, "People & Body");
        assert_eq!(wave.shortcodes, vec!["wave"]);
        assert_eq!(wave.keywords, vec!["wave", "hand", "fingers", "open"]);
        assert!(wave.supports_skin_tone);

        let grin = &entries[0];
        assert!(!grin.supports_skin_tone);
    }

    #[test]
    fn test_missing_name_and_category() {
        let entries = convert_records(records(), ImageVendor::Apple);
        let flag = entries.last().unwrap();
        assert_eq!(flag.name, "transgender flag");
        assert_eq!(flag.category, UNKNOWN_CATEGORY);
        assert_eq!(flag.keywords, vec!["transgender", "flag"]);
    }

    #[test]
    fn test_identifier_includes_vendor() {
        let source = EmojiDataSource::new(DEFAULT_EMOJI_DATA_URL, ImageVendor::Google).unwrap();
        assert_eq!(source.identifier(), "emoji-data-google");
        assert_eq!(source.refresh_interval(), DEFAULT_REFRESH_INTERVAL);
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(EmojiDataSource::new("::nope", ImageVendor::Apple).is_err());
    }
}
