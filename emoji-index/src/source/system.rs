//! Offline source reading the Unicode `emoji-test.txt` installed by the OS.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{ensure_not_empty, DataSource, SourceError, SourceResult, DEFAULT_REFRESH_INTERVAL};
use crate::models::{RawEntry, UNKNOWN_CATEGORY};

const SKIN_TONE_MODIFIERS: std::ops::RangeInclusive<u32> = 0x1F3FB..=0x1F3FF;
const VARIATION_SELECTOR_16: u32 = 0xFE0F;

#[cfg(target_os = "linux")]
fn default_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/usr/share/unicode/emoji/emoji-test.txt"),
        PathBuf::from("/usr/share/unicode-data/emoji/emoji-test.txt"),
    ]
}

#[cfg(not(target_os = "linux"))]
fn default_paths() -> Vec<PathBuf> {
    Vec::new()
}

#[derive(Debug, Clone)]
pub struct SystemSource {
    paths: Vec<PathBuf>,
}

impl Default for SystemSource {
    fn default() -> Self {
        Self {
            paths: default_paths(),
        }
    }
}

impl SystemSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search these files instead of the OS locations
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl DataSource for SystemSource {
    fn identifier(&self) -> String {
        "system-emoji-test".to_string()
    }

    fn refresh_interval(&self) -> Duration {
        DEFAULT_REFRESH_INTERVAL
    }

    async fn fetch(&self) -> SourceResult<Vec<RawEntry>> {
        let mut found = None;
        for path in &self.paths {
            if tokio::fs::metadata(path).await.is_ok() {
                found = Some(path);
                break;
            }
        }
        let Some(path) = found else {
            return Err(SourceError::Unavailable {
                source_id: self.identifier(),
                reason: "no emoji-test.txt installed".to_string(),
            });
        };

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|error| SourceError::Io {
                path: path.display().to_string(),
                error,
            })?;
        let entries = parse_emoji_test(&text);
        debug!(path = %path.display(), entries = entries.len(), "parsed emoji-test.txt");
        ensure_not_empty(&self.identifier(), entries)
    }
}

/// Parse the Unicode emoji-test format into entries in file order.
///
/// Only fully-qualified sequences are kept. Skin-tone variants are folded
/// into their base entry as `supports_skin_tone`.
pub fn parse_emoji_test(text: &str) -> Vec<RawEntry> {
    let mut entries: Vec<RawEntry> = Vec::new();
    let mut by_base: HashMap<Vec<u32>, usize> = HashMap::new();
    let mut group = UNKNOWN_CATEGORY.to_string();
    let mut subgroup_words: Vec<String> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("# group:") {
            group = rest.trim().to_string();
            continue;
        }
        if let Some(rest) = line.strip_prefix("# subgroup:") {
            subgroup_words = rest
                .trim()
                .split('-')
                .filter(|w| !w.is_empty())
                .map(str::to_lowercase)
                .collect();
            continue;
        }
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((codes, rest)) = line.split_once(';') else {
            continue;
        };
        let Some((status, comment)) = rest.split_once('#') else {
            continue;
        };
        if status.trim() != "fully-qualified" {
            continue;
        }

        let Some(points) = codes
            .split_whitespace()
            .map(|c| u32::from_str_radix(c, 16).ok())
            .collect::<Option<Vec<u32>>>()
        else {
            continue;
        };

        let key: Vec<u32> = points
            .iter()
            .copied()
            .filter(|p| !SKIN_TONE_MODIFIERS.contains(p) && *p != VARIATION_SELECTOR_16)
            .collect();

        if points.iter().any(|p| SKIN_TONE_MODIFIERS.contains(p)) {
            if let Some(&index) = by_base.get(&key) {
                entries[index].supports_skin_tone = true;
            }
            continue;
        }

        let Some(character) = points.iter().map(|&p| char::from_u32(p)).collect::<Option<String>>()
        else {
            continue;
        };

        // "😀 E1.0 grinning face"
        let mut parts = comment.trim().splitn(3, ' ');
        let _glyph = parts.next();
        let _version = parts.next();
        let name = parts.next().unwrap_or_default().trim().to_string();

        by_base.entry(key).or_insert(entries.len());
        entries.push(
            RawEntry::new(character, name, group.clone()).with_keywords(subgroup_words.clone()),
        );
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# emoji-test.txt
# Version: 15.1

# group: Smileys & Emotion

# subgroup: face-smiling
1F600                                                  ; fully-qualified     # 😀 E1.0 grinning face
263A FE0F                                              ; fully-qualified     # ☺️ E0.6 smiling face
263A                                                   ; unqualified         # ☺ E0.6 smiling face

# group: People & Body

# subgroup: hand-single-finger
261D FE0F                                              ; fully-qualified     # ☝️ E0.6 index pointing up
261D 1F3FB                                             ; fully-qualified     # ☝🏻 E1.0 index pointing up: light skin tone
1F44D                                                  ; fully-qualified     # 👍 E0.6 thumbs up

# group: Component

# subgroup: skin-tone
1F3FB                                                  ; component           # 🏻 E1.0 light skin tone
";

    #[test]
    fn test_parse_keeps_fully_qualified_in_order() {
        let entries = parse_emoji_test(SAMPLE);
        let characters: Vec<&str> = entries.iter().map(|e| e.character.as_str()).collect();
        assert_eq!(characters, vec!["😀", "☺\u{fe0f}", "☝\u{fe0f}", "👍"]);
    }

    #[test]
    fn test_parse_fields() {
        let entries = parse_emoji_test(SAMPLE);
        assert_eq!(entries[0].name, "grinning face");
        assert_eq!(entries[0].category, "Smileys & Emotion");
        assert_eq!(entries[0].keywords, vec!["face", "smiling"]);
        assert_eq!(entries[3].category, "People & Body");
    }

    #[test]
    fn test_skin_tone_variant_marks_base() {
        let entries = parse_emoji_test(SAMPLE);
        let pointing = entries.iter().find(|e| e.name == "index pointing up").unwrap();
        assert!(pointing.supports_skin_tone);
        assert!(!entries[3].supports_skin_tone);
        assert!(entries.iter().all(|e| !e.name.contains("skin tone")));
    }

    #[tokio::test]
    async fn test_no_installed_file_is_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = SystemSource::with_paths(vec![dir.path().join("emoji-test.txt")]);
        assert!(matches!(
            source.fetch().await,
            Err(SourceError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_reads_first_existing_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("emoji-test.txt");
        std::fs::write(&path, SAMPLE).unwrap();
        let source = SystemSource::with_paths(vec![dir.path().join("missing.txt"), path]);
        assert_eq!(source.fetch().await.unwrap().len(), 4);
    }
}
