//! Decaying usage scores behind the favorites row.
//!
//! Every recorded use multiplies all scores by `decay_factor` and adds 1.0 to
//! the picked character, so a character used on every pick converges towards
//! `1 / (1 - decay_factor)`.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    pub enabled: bool,
    /// Entries protected from pruning, and the floor of the favorites row
    pub min_favorites: usize,
    pub max_favorites: usize,
    pub decay_factor: f64,
    pub prune_threshold: f64,
    /// Characters seeded whenever the table is empty
    pub default_seed: Vec<String>,
    /// JSON score file; `None` keeps scores in memory only
    pub store_path: Option<PathBuf>,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_favorites: 8,
            max_favorites: 24,
            decay_factor: 0.9,
            prune_threshold: 0.01,
            default_seed: ["👍", "❤️", "😂", "😊", "🙏", "😭", "🔥", "😍"]
                .into_iter()
                .map(String::from)
                .collect(),
            store_path: None,
        }
    }
}

/// On-disk row, written in insertion order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredScore {
    character: String,
    score: f64,
}

#[derive(Debug, Clone, Copy)]
struct ScoreEntry {
    score: f64,
    /// Insertion order, breaks score ties
    seq: u64,
}

struct UsageState {
    config: UsageConfig,
    scores: HashMap<String, ScoreEntry>,
    next_seq: u64,
    version: u64,
}

impl UsageState {
    fn insert(&mut self, character: String, score: f64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.scores.insert(character, ScoreEntry { score, seq });
    }

    fn seed_if_empty(&mut self) -> bool {
        if !self.scores.is_empty() || self.config.default_seed.is_empty() {
            return false;
        }
        let seed_score = 2.0 * self.config.prune_threshold;
        for character in self.config.default_seed.clone() {
            if !self.scores.contains_key(&character) {
                self.insert(character, seed_score);
            }
        }
        true
    }

    /// Characters ordered by score descending, insertion order on ties
    fn ranked(&self) -> Vec<(&String, &ScoreEntry)> {
        let mut ranked: Vec<_> = self.scores.iter().collect();
        ranked.sort_by(|(_, a), (_, b)| b.score.total_cmp(&a.score).then(a.seq.cmp(&b.seq)));
        ranked
    }

    fn prune(&mut self) {
        let min_favorites = self.config.min_favorites;
        if self.scores.len() <= min_favorites {
            return;
        }
        let threshold = self.config.prune_threshold;
        let doomed: Vec<String> = self
            .ranked()
            .into_iter()
            .skip(min_favorites)
            .filter(|(_, entry)| entry.score < threshold)
            .map(|(character, _)| character.clone())
            .collect();
        for character in doomed {
            self.scores.remove(&character);
        }
    }

    fn snapshot(&mut self) -> (u64, Vec<StoredScore>) {
        self.version += 1;
        let mut rows: Vec<(&String, &ScoreEntry)> = self.scores.iter().collect();
        rows.sort_by_key(|(_, entry)| entry.seq);
        let rows = rows
            .into_iter()
            .map(|(character, entry)| StoredScore {
                character: character.clone(),
                score: entry.score,
            })
            .collect();
        (self.version, rows)
    }
}

/// Persisted, process-wide score table. Cheap to share behind an `Arc`.
pub struct UsageTracker {
    state: Mutex<UsageState>,
    store_path: Option<PathBuf>,
    /// Version of the last snapshot written to disk
    persisted: Mutex<u64>,
}

impl UsageTracker {
    /// Build a tracker, loading any scores already stored at `config.store_path`.
    pub fn new(config: UsageConfig) -> Self {
        let store_path = config.store_path.clone();
        let mut state = UsageState {
            config,
            scores: HashMap::new(),
            next_seq: 0,
            version: 0,
        };
        if let Some(path) = &store_path {
            for row in read_store(path) {
                state.insert(row.character, row.score);
            }
        }
        Self {
            state: Mutex::new(state),
            store_path,
            persisted: Mutex::new(0),
        }
    }

    pub fn in_memory(config: UsageConfig) -> Self {
        Self::new(UsageConfig {
            store_path: None,
            ..config
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().config.enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.lock().config.enabled = enabled;
    }

    /// Decay every score, then boost `character` by one.
    pub fn record_use(&self, character: &str) {
        if character.is_empty() {
            return;
        }
        let snapshot = {
            let mut state = self.state.lock();
            if !state.config.enabled {
                return;
            }
            state.seed_if_empty();

            let decay = state.config.decay_factor;
            for entry in state.scores.values_mut() {
                entry.score *= decay;
            }
            match state.scores.get_mut(character) {
                Some(entry) => entry.score += 1.0,
                None => state.insert(character.to_string(), 1.0),
            }
            state.prune();
            state.snapshot()
        };
        self.persist(snapshot);
    }

    /// Favorite characters, best first. Empty when disabled.
    pub fn favorites(&self) -> Vec<String> {
        let (favorites, snapshot) = {
            let mut state = self.state.lock();
            if !state.config.enabled {
                return Vec::new();
            }
            let snapshot = state.seed_if_empty().then(|| state.snapshot());
            let threshold = state.config.prune_threshold;
            let favorites: Vec<String> = state
                .ranked()
                .into_iter()
                .filter(|(_, entry)| entry.score > threshold)
                .take(state.config.max_favorites)
                .map(|(character, _)| character.clone())
                .collect();
            (favorites, snapshot)
        };
        if let Some(snapshot) = snapshot {
            self.persist(snapshot);
        }
        favorites
    }

    /// Current score, 0.0 when never used
    pub fn score(&self, character: &str) -> f64 {
        self.state
            .lock()
            .scores
            .get(character)
            .map(|e| e.score)
            .unwrap_or(0.0)
    }

    /// Replace the whole table. An empty replacement is re-seeded on next use.
    pub fn clear_all(&self, replacement: impl IntoIterator<Item = (String, f64)>) {
        let snapshot = {
            let mut state = self.state.lock();
            state.scores.clear();
            state.next_seq = 0;
            for (character, score) in replacement {
                if !character.is_empty() && score.is_finite() && !state.scores.contains_key(&character) {
                    state.insert(character, score);
                }
            }
            state.snapshot()
        };
        self.persist(snapshot);
    }

    /// `(character, score)` pairs in insertion order
    pub fn snapshot(&self) -> Vec<(String, f64)> {
        let state = self.state.lock();
        let mut rows: Vec<_> = state
            .scores
            .iter()
            .map(|(c, e)| (e.seq, c.clone(), e.score))
            .collect();
        rows.sort_by_key(|(seq, _, _)| *seq);
        rows.into_iter().map(|(_, c, s)| (c, s)).collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a snapshot unless a newer one already reached disk
    fn persist(&self, (version, rows): (u64, Vec<StoredScore>)) {
        let Some(path) = &self.store_path else {
            return;
        };
        let mut persisted = self.persisted.lock();
        if version <= *persisted {
            return;
        }
        match write_store(path, &rows) {
            Ok(()) => *persisted = version,
            Err(e) => warn!(path = %path.display(), error = %e, "failed to persist usage scores"),
        }
    }
}

impl std::fmt::Debug for UsageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageTracker")
            .field("entries", &self.len())
            .field("store_path", &self.store_path)
            .finish()
    }
}

fn read_store(path: &Path) -> Vec<StoredScore> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read usage scores");
            return Vec::new();
        }
    };
    match serde_json::from_slice::<Vec<StoredScore>>(&bytes) {
        Ok(rows) => {
            debug!(path = %path.display(), entries = rows.len(), "loaded usage scores");
            rows.into_iter()
                .filter(|r| !r.character.is_empty() && r.score.is_finite())
                .collect()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "discarding unreadable usage scores");
            Vec::new()
        }
    }
}

fn write_store(path: &Path, rows: &[StoredScore]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec(rows)?;
    let temp = path.with_extension("tmp");
    std::fs::write(&temp, bytes)?;
    std::fs::rename(&temp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn unseeded() -> UsageConfig {
        UsageConfig {
            default_seed: Vec::new(),
            ..UsageConfig::default()
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_decay_sequence() {
        let tracker = UsageTracker::in_memory(unseeded());
        tracker.record_use("😀");
        assert!(approx(tracker.score("😀"), 1.0));
        tracker.record_use("😀");
        assert!(approx(tracker.score("😀"), 1.9));
        tracker.record_use("😀");
        assert!(approx(tracker.score("😀"), 2.71));
    }

    #[test]
    fn test_repeated_use_is_monotonic_and_bounded() {
        let tracker = UsageTracker::in_memory(unseeded());
        let bound = 1.0 / (1.0 - 0.9);
        let mut previous = 0.0;
        for _ in 0..200 {
            tracker.record_use("🔥");
            let score = tracker.score("🔥");
            assert!(score > previous || approx(score, previous));
            assert!(score < bound);
            previous = score;
        }
    }

    #[test]
    fn test_other_scores_decay() {
        let tracker = UsageTracker::in_memory(unseeded());
        tracker.record_use("😀");
        tracker.record_use("😂");
        assert!(approx(tracker.score("😀"), 0.9));
        assert!(approx(tracker.score("😂"), 1.0));
        assert_eq!(tracker.favorites(), vec!["😂", "😀"]);
    }

    #[test]
    fn test_pruning_keeps_protected_floor() {
        let config = UsageConfig {
            min_favorites: 3,
            ..unseeded()
        };
        let tracker = UsageTracker::in_memory(config);
        for c in ["a", "b", "c", "d", "e"] {
            tracker.record_use(c);
        }
        for _ in 0..100 {
            tracker.record_use("z");
        }

        // Everything but "z" decayed far below the threshold
        assert!(tracker.score("e") < 0.01);
        assert_eq!(tracker.len(), 3);
        let kept: Vec<String> = tracker.snapshot().into_iter().map(|(c, _)| c).collect();
        assert_eq!(kept, vec!["d", "e", "z"]);
    }

    #[test]
    fn test_no_pruning_at_or_below_min_favorites() {
        let config = UsageConfig {
            min_favorites: 8,
            ..unseeded()
        };
        let tracker = UsageTracker::in_memory(config);
        tracker.record_use("a");
        for _ in 0..100 {
            tracker.record_use("b");
        }
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_seeding_on_empty_table() {
        let config = UsageConfig {
            default_seed: vec!["👍".into(), "❤️".into()],
            ..UsageConfig::default()
        };
        let tracker = UsageTracker::in_memory(config);
        assert_eq!(tracker.favorites(), vec!["👍", "❤️"]);
        assert!(approx(tracker.score("👍"), 0.02));

        tracker.record_use("🎉");
        assert!(approx(tracker.score("👍"), 0.018));
        assert_eq!(tracker.favorites(), vec!["🎉", "👍", "❤️"]);

        tracker.clear_all(Vec::new());
        assert!(tracker.is_empty());
        assert_eq!(tracker.favorites().len(), 2);
    }

    #[test]
    fn test_favorites_cap_and_disable() {
        let config = UsageConfig {
            max_favorites: 2,
            ..unseeded()
        };
        let tracker = UsageTracker::in_memory(config);
        for c in ["a", "b", "c"] {
            tracker.record_use(c);
        }
        assert_eq!(tracker.favorites(), vec!["c", "b"]);

        tracker.set_enabled(false);
        assert!(tracker.favorites().is_empty());
        tracker.record_use("d");
        assert_eq!(tracker.score("d"), 0.0);
    }

    #[test]
    fn test_equal_scores_keep_insertion_order() {
        let tracker = UsageTracker::in_memory(unseeded());
        tracker.clear_all(vec![("x".to_string(), 1.0), ("y".to_string(), 1.0), ("w".to_string(), 2.0)]);
        assert_eq!(tracker.favorites(), vec!["w", "x", "y"]);
    }

    #[test]
    fn test_scores_persist_across_instances() {
        let dir = TempDir::new().unwrap();
        let config = UsageConfig {
            store_path: Some(dir.path().join("usage").join("scores.json")),
            ..unseeded()
        };

        let tracker = UsageTracker::new(config.clone());
        tracker.record_use("😀");
        tracker.record_use("🐶");

        let reopened = UsageTracker::new(config);
        assert!(approx(reopened.score("😀"), 0.9));
        assert!(approx(reopened.score("🐶"), 1.0));
        assert_eq!(reopened.snapshot().len(), 2);
    }

    #[test]
    fn test_unreadable_store_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.json");
        std::fs::write(&path, b"not json").unwrap();
        let tracker = UsageTracker::new(UsageConfig {
            store_path: Some(path),
            ..unseeded()
        });
        assert!(tracker.is_empty());
    }
}
