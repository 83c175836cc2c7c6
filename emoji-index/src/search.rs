//! Tiered emoji search over a built catalog.
//!
//! Tiers, each skipping characters an earlier tier already matched:
//! 1. exact shortcode (pinned first under every ranking)
//! 2. name contains the query
//! 3. a shortcode starts with the query
//! 4. a keyword starts with the query

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::catalog::{normalize_shortcode, CatalogIndex, SearchKeys};
use crate::interface::{Emoji, SearchRanking};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Apply the ranking to the empty query's full-catalog result
    pub rank_empty_query: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rank_empty_query: true,
        }
    }
}

/// Run a query. `score` supplies usage scores for `SearchRanking::Usage`.
pub fn search<F>(
    catalog: &CatalogIndex,
    query: &str,
    ranking: SearchRanking,
    score: F,
    config: &SearchConfig,
) -> Vec<Emoji>
where
    F: Fn(&str) -> f64,
{
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        let mut all = catalog.emojis().to_vec();
        if config.rank_empty_query {
            rank(&mut all, ranking, &score);
        }
        return all;
    }

    let shortcode_query = normalize_shortcode(&query);
    let keys = catalog.keys();
    let mut seen: HashSet<usize> = HashSet::new();

    let pinned = if shortcode_query.is_empty() {
        None
    } else {
        catalog.shortcode_position(&shortcode_query)
    };
    if let Some(position) = pinned {
        seen.insert(position);
    }

    let mut matched: Vec<usize> = Vec::new();
    gather(keys, &mut seen, &mut matched, |k| k.name.contains(&query));
    if !shortcode_query.is_empty() {
        gather(keys, &mut seen, &mut matched, |k| {
            k.shortcodes.iter().any(|s| s.starts_with(&shortcode_query))
        });
    }
    gather(keys, &mut seen, &mut matched, |k| {
        k.keywords.iter().any(|w| w.starts_with(&query))
    });

    let emojis = catalog.emojis();
    let mut results: Vec<Emoji> = matched.into_iter().map(|i| emojis[i].clone()).collect();
    rank(&mut results, ranking, &score);

    if let Some(position) = pinned {
        results.insert(0, emojis[position].clone());
    }
    results
}

/// Append positions matching `predicate` that no earlier tier took
fn gather(
    keys: &[SearchKeys],
    seen: &mut HashSet<usize>,
    matched: &mut Vec<usize>,
    predicate: impl Fn(&SearchKeys) -> bool,
) {
    for (position, key) in keys.iter().enumerate() {
        if predicate(key) && seen.insert(position) {
            matched.push(position);
        }
    }
}

/// Stable reorder; `Relevance` keeps tier order
fn rank<F>(emojis: &mut [Emoji], ranking: SearchRanking, score: &F)
where
    F: Fn(&str) -> f64,
{
    match ranking {
        SearchRanking::Relevance => {}
        SearchRanking::Usage => {
            emojis.sort_by_cached_key(|e| std::cmp::Reverse(OrderedScore(score(&e.character))));
        }
        SearchRanking::Alphabetical => {
            emojis.sort_by_cached_key(|e| e.name.to_lowercase());
        }
    }
}

/// Total order over usage scores
#[derive(Debug, Clone, Copy, PartialEq)]
struct OrderedScore(f64);

impl Eq for OrderedScore {}

impl PartialOrd for OrderedScore {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedScore {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawEntry;
    use std::collections::HashMap;

    fn no_usage(_: &str) -> f64 {
        0.0
    }

    fn ids(results: &[Emoji]) -> Vec<&str> {
        results.iter().map(|e| e.id()).collect()
    }

    fn scenario() -> CatalogIndex {
        CatalogIndex::build(&[
            RawEntry::new("😀", "grinning face", "Smileys & Emotion").with_shortcodes(["grinning"]),
            RawEntry::new("😂", "face with tears of joy", "Smileys & Emotion")
                .with_shortcodes(["joy", "laughing"]),
        ])
    }

    fn catalog() -> CatalogIndex {
        CatalogIndex::build(&[
            RawEntry::new("😀", "grinning face", "Smileys & Emotion")
                .with_shortcodes(["grinning"])
                .with_keywords(["smile", "happy"]),
            RawEntry::new("😺", "grinning cat", "Smileys & Emotion")
                .with_shortcodes(["smiley_cat"])
                .with_keywords(["cat", "smile"]),
            RawEntry::new("🐱", "cat face", "Animals & Nature").with_shortcodes(["cat"]),
            RawEntry::new("🐈", "cat", "Animals & Nature").with_shortcodes(["cat2"]),
            RawEntry::new("🙂", "slightly smiling face", "Smileys & Emotion")
                .with_shortcodes(["slightly_smiling_face"]),
            RawEntry::new("😊", "blushing", "Smileys & Emotion")
                .with_shortcodes(["blush"])
                .with_keywords(["smile"]),
        ])
    }

    #[test]
    fn test_exact_shortcode_scenario() {
        let index = scenario();
        let config = SearchConfig::default();
        let results = search(&index, "grinning", SearchRanking::Relevance, no_usage, &config);
        assert_eq!(ids(&results), vec!["😀"]);
    }

    #[test]
    fn test_name_substring_scenario() {
        let index = scenario();
        let config = SearchConfig::default();
        let relevance = search(&index, "face", SearchRanking::Relevance, no_usage, &config);
        assert_eq!(ids(&relevance), vec!["😀", "😂"]);

        let alphabetical = search(&index, "  FACE ", SearchRanking::Alphabetical, no_usage, &config);
        assert_eq!(ids(&alphabetical), vec!["😂", "😀"]);
    }

    #[test]
    fn test_exact_shortcode_pinned_under_every_ranking() {
        let index = catalog();
        let config = SearchConfig::default();
        let usage: HashMap<&str, f64> = HashMap::from([("🐈", 5.0), ("😺", 9.0)]);
        let by_usage = |c: &str| usage.get(c).copied().unwrap_or(0.0);

        for ranking in [
            SearchRanking::Relevance,
            SearchRanking::Usage,
            SearchRanking::Alphabetical,
        ] {
            let results = search(&index, "cat", ranking, by_usage, &config);
            assert_eq!(results[0].character, "🐱", "ranking {ranking:?}");
            assert_eq!(results.len(), 3);
        }
    }

    #[test]
    fn test_tier_order_under_relevance() {
        let index = catalog();
        let config = SearchConfig::default();
        // Pinned shortcode, then name matches in catalog order
        let results = search(&index, "cat", SearchRanking::Relevance, no_usage, &config);
        assert_eq!(ids(&results), vec!["🐱", "😺", "🐈"]);

        let results = search(&index, "cat", SearchRanking::Alphabetical, no_usage, &config);
        assert_eq!(ids(&results), vec!["🐱", "🐈", "😺"]);
    }

    #[test]
    fn test_keyword_prefix_never_outranks_name_match() {
        let index = catalog();
        let results = search(&index, "smil", SearchRanking::Relevance, no_usage, &SearchConfig::default());
        // Name match first, then shortcode prefix, then keyword prefix
        assert_eq!(ids(&results), vec!["🙂", "😺", "😀", "😊"]);
    }

    #[test]
    fn test_usage_ranking_is_stable() {
        let index = catalog();
        let usage: HashMap<&str, f64> = HashMap::from([("😊", 3.0)]);
        let results = search(
            &index,
            "smil",
            SearchRanking::Usage,
            |c: &str| usage.get(c).copied().unwrap_or(0.0),
            &SearchConfig::default(),
        );
        assert_eq!(ids(&results), vec!["😊", "🙂", "😺", "😀"]);
    }

    #[test]
    fn test_colon_wrapped_query() {
        let index = catalog();
        let results = search(&index, ":blush:", SearchRanking::Relevance, no_usage, &SearchConfig::default());
        assert_eq!(ids(&results), vec!["😊"]);
    }

    #[test]
    fn test_empty_query_ranking_is_configurable() {
        let index = scenario();
        let ranked = SearchConfig { rank_empty_query: true };
        let natural = SearchConfig { rank_empty_query: false };

        let results = search(&index, "   ", SearchRanking::Alphabetical, no_usage, &ranked);
        assert_eq!(ids(&results), vec!["😂", "😀"]);

        let results = search(&index, "", SearchRanking::Alphabetical, no_usage, &natural);
        assert_eq!(ids(&results), vec!["😀", "😂"]);
    }

    #[test]
    fn test_no_match_and_empty_catalog() {
        let config = SearchConfig::default();
        assert!(search(&catalog(), "zzz", SearchRanking::Relevance, no_usage, &config).is_empty());
        let empty = CatalogIndex::default();
        assert!(search(&empty, "", SearchRanking::Usage, no_usage, &config).is_empty());
        assert!(search(&empty, "cat", SearchRanking::Usage, no_usage, &config).is_empty());
    }
}
