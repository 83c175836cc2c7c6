//! Immutable lookup structures built from one batch.
//!
//! A new batch always produces a new `CatalogIndex`; nothing is updated in place.

use std::collections::{BTreeMap, HashMap};

use crate::interface::{Emoji, EmojiCategory, EmojiSection};
use crate::models::RawEntry;

/// Lowercased text matched by search, precomputed at build time
#[derive(Debug, Clone)]
pub(crate) struct SearchKeys {
    pub name: String,
    pub shortcodes: Vec<String>,
    pub keywords: Vec<String>,
}

impl SearchKeys {
    fn new(emoji: &Emoji) -> Self {
        Self {
            name: emoji.name.to_lowercase(),
            shortcodes: emoji.shortcodes.iter().map(|s| s.to_lowercase()).collect(),
            keywords: emoji.keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    emojis: Vec<Emoji>,
    keys: Vec<SearchKeys>,
    by_character: HashMap<String, usize>,
    by_shortcode: HashMap<String, usize>,
    by_category: BTreeMap<EmojiCategory, Vec<usize>>,
}

impl CatalogIndex {
    /// Build every lookup in one pass. Entries with an unmapped category are
    /// dropped. A repeated character keeps its first position and takes the
    /// last value; a repeated shortcode points at the last emoji carrying it.
    pub fn build(entries: &[RawEntry]) -> Self {
        let mut index = Self::default();

        for emoji in entries.iter().filter_map(RawEntry::to_emoji) {
            let position = match index.by_character.get(&emoji.character) {
                Some(&existing) => {
                    let previous = &index.emojis[existing];
                    if previous.category != emoji.category {
                        if let Some(list) = index.by_category.get_mut(&previous.category) {
                            list.retain(|&i| i != existing);
                        }
                        index.by_category.entry(emoji.category).or_default().push(existing);
                    }
                    index.keys[existing] = SearchKeys::new(&emoji);
                    index.emojis[existing] = emoji;
                    existing
                }
                None => {
                    let position = index.emojis.len();
                    index.by_character.insert(emoji.character.clone(), position);
                    index.by_category.entry(emoji.category).or_default().push(position);
                    index.keys.push(SearchKeys::new(&emoji));
                    index.emojis.push(emoji);
                    position
                }
            };

            for shortcode in &index.keys[position].shortcodes {
                index.by_shortcode.insert(shortcode.clone(), position);
            }
        }

        index.by_category.retain(|_, list| !list.is_empty());
        index
    }

    pub fn len(&self) -> usize {
        self.emojis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emojis.is_empty()
    }

    /// Every emoji in catalog order
    pub fn emojis(&self) -> &[Emoji] {
        &self.emojis
    }

    pub fn by_character(&self, character: &str) -> Option<&Emoji> {
        self.by_character.get(character).map(|&i| &self.emojis[i])
    }

    /// Case-insensitive; surrounding colons are ignored (`:joy:`)
    pub fn by_shortcode(&self, shortcode: &str) -> Option<&Emoji> {
        let key = normalize_shortcode(shortcode);
        self.by_shortcode.get(&key).map(|&i| &self.emojis[i])
    }

    /// Non-empty categories in fixed order
    pub fn categories(&self) -> Vec<EmojiCategory> {
        self.by_category.keys().copied().collect()
    }

    /// One section per non-empty category, emoji in catalog order
    pub fn sections(&self) -> Vec<EmojiSection> {
        self.by_category
            .iter()
            .map(|(&category, positions)| {
                let mut positions = positions.clone();
                positions.sort_unstable();
                EmojiSection {
                    category,
                    emojis: positions.iter().map(|&i| self.emojis[i].clone()).collect(),
                }
            })
            .collect()
    }

    /// Resolve characters against the catalog, skipping unknown ones
    pub fn resolve<'a, I>(&self, characters: I) -> Vec<Emoji>
    where
        I: IntoIterator<Item = &'a str>,
    {
        characters
            .into_iter()
            .filter_map(|c| self.by_character(c).cloned())
            .collect()
    }

    pub(crate) fn keys(&self) -> &[SearchKeys] {
        &self.keys
    }

    pub(crate) fn shortcode_position(&self, key: &str) -> Option<usize> {
        self.by_shortcode.get(key).copied()
    }
}

pub(crate) fn normalize_shortcode(shortcode: &str) -> String {
    shortcode.trim().trim_matches(':').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<RawEntry> {
        vec![
            RawEntry::new("😀", "grinning face", "Smileys & Emotion").with_shortcodes(["grinning"]),
            RawEntry::new("🐶", "dog face", "Animals & Nature").with_shortcodes(["dog"]),
            RawEntry::new("🏻", "light skin tone", "Component"),
            RawEntry::new("😂", "face with tears of joy", "Smileys & Emotion")
                .with_shortcodes(["joy", "Laughing"]),
            RawEntry::new("🇺🇸", "flag: United States", "Flags").with_shortcodes(["us"]),
        ]
    }

    #[test]
    fn test_build_drops_unmapped_categories() {
        let index = CatalogIndex::build(&entries());
        assert_eq!(index.len(), 4);
        assert!(index.by_character("🏻").is_none());
        assert_eq!(index.by_character("🐶").unwrap().name, "dog face");
    }

    #[test]
    fn test_sections_follow_category_order() {
        let index = CatalogIndex::build(&entries());
        let sections = index.sections();
        let categories: Vec<EmojiCategory> = sections.iter().map(|s| s.category).collect();
        assert_eq!(
            categories,
            vec![
                EmojiCategory::SmileysEmotion,
                EmojiCategory::AnimalsNature,
                EmojiCategory::Flags
            ]
        );
        assert_eq!(index.categories(), categories);
        let smileys: Vec<&str> = sections[0].emojis.iter().map(|e| e.id()).collect();
        assert_eq!(smileys, vec!["😀", "😂"]);
    }

    #[test]
    fn test_shortcode_lookup_is_normalized() {
        let index = CatalogIndex::build(&entries());
        assert_eq!(index.by_shortcode("joy").unwrap().character, "😂");
        assert_eq!(index.by_shortcode(":JOY:").unwrap().character, "😂");
        assert_eq!(index.by_shortcode("laughing").unwrap().character, "😂");
        assert!(index.by_shortcode("cat").is_none());
    }

    #[test]
    fn test_duplicates_last_write_wins() {
        let index = CatalogIndex::build(&[
            RawEntry::new("😀", "old name", "Smileys & Emotion").with_shortcodes(["smile"]),
            RawEntry::new("🐶", "dog face", "Animals & Nature").with_shortcodes(["smile"]),
            RawEntry::new("😀", "new name", "People & Body"),
        ]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.emojis()[0].name, "new name");
        assert_eq!(index.by_shortcode("smile").unwrap().character, "🐶");
        assert_eq!(
            index.categories(),
            vec![EmojiCategory::PeopleBody, EmojiCategory::AnimalsNature]
        );
    }

    #[test]
    fn test_resolve_skips_unknown() {
        let index = CatalogIndex::build(&entries());
        let resolved = index.resolve(["😂", "👽", "😀"]);
        let ids: Vec<&str> = resolved.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["😂", "😀"]);
    }

    #[test]
    fn test_empty_batch() {
        let index = CatalogIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.sections().is_empty());
    }
}
