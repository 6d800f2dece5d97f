use serde::{Deserialize, Serialize};

use crate::rating::math::MathError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub question_id: String,
    pub mu: f64,
}

/// Per-level collection of `(question, difficulty mean)` pairs kept sorted
/// by mean, queryable for the closest entry at or above / at or below a
/// target. Insertion order is stable among equal means, so lookups resolve
/// ties deterministically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionDifficultyIndex {
    entries: Vec<IndexEntry>,
}

impl QuestionDifficultyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.entries.iter().any(|e| e.question_id == question_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// Adds a question at the given difficulty mean. An existing entry for
    /// the same question is replaced.
    pub fn insert(&mut self, question_id: impl Into<String>, mu: f64) -> Result<(), MathError> {
        if !mu.is_finite() {
            return Err(MathError::NonFinite("indexed difficulty mean"));
        }
        let question_id = question_id.into();
        self.entries.retain(|e| e.question_id != question_id);
        let pos = self.entries.partition_point(|e| e.mu <= mu);
        self.entries.insert(pos, IndexEntry { question_id, mu });
        Ok(())
    }

    /// Re-positions a question after its difficulty rating changed.
    /// Returns `false` when the question is not indexed here.
    pub fn set_difficulty(&mut self, question_id: &str, mu: f64) -> Result<bool, MathError> {
        if !mu.is_finite() {
            return Err(MathError::NonFinite("indexed difficulty mean"));
        }
        if !self.contains(question_id) {
            return Ok(false);
        }
        self.insert(question_id.to_string(), mu)?;
        Ok(true)
    }

    /// Closest entry with mean `>= target`, ties resolved to the
    /// earliest-inserted entry.
    pub fn first_at_or_above(&self, target: f64) -> Option<&IndexEntry> {
        let pos = self.entries.partition_point(|e| e.mu < target);
        self.entries.get(pos)
    }

    /// Closest entry with mean `<= target`.
    pub fn last_at_or_below(&self, target: f64) -> Option<&IndexEntry> {
        let pos = self.entries.partition_point(|e| e.mu <= target);
        pos.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// All entries with mean `>= target`, ascending.
    pub fn entries_at_or_above(&self, target: f64) -> impl Iterator<Item = &IndexEntry> {
        let pos = self.entries.partition_point(|e| e.mu < target);
        self.entries[pos..].iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(values: &[(&str, f64)]) -> QuestionDifficultyIndex {
        let mut idx = QuestionDifficultyIndex::new();
        for (id, mu) in values {
            idx.insert(*id, *mu).unwrap();
        }
        idx
    }

    #[test]
    fn test_lookup_above_and_below() {
        let idx = index(&[("a", 700.0), ("b", 800.0), ("c", 900.0), ("d", 1000.0)]);
        assert_eq!(idx.first_at_or_above(850.0).unwrap().question_id, "c");
        assert_eq!(idx.first_at_or_above(800.0).unwrap().question_id, "b");
        assert!(idx.first_at_or_above(1200.0).is_none());
        assert_eq!(idx.last_at_or_below(1200.0).unwrap().question_id, "d");
        assert!(idx.last_at_or_below(600.0).is_none());
    }

    #[test]
    fn test_ties_resolve_to_earliest_inserted() {
        let idx = index(&[("first", 800.0), ("second", 800.0)]);
        assert_eq!(idx.first_at_or_above(800.0).unwrap().question_id, "first");
    }

    #[test]
    fn test_insert_replaces_existing_entry() {
        let mut idx = index(&[("a", 700.0), ("b", 900.0)]);
        idx.insert("a", 950.0).unwrap();
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.first_at_or_above(920.0).unwrap().question_id, "a");
    }

    #[test]
    fn test_set_difficulty_repositions() {
        let mut idx = index(&[("a", 700.0), ("b", 800.0)]);
        assert!(idx.set_difficulty("a", 820.0).unwrap());
        assert_eq!(idx.first_at_or_above(810.0).unwrap().question_id, "a");
        assert!(!idx.set_difficulty("missing", 500.0).unwrap());
    }

    #[test]
    fn test_rejects_non_finite_difficulty() {
        let mut idx = QuestionDifficultyIndex::new();
        assert!(idx.insert("a", f64::NAN).is_err());
        assert!(idx.insert("a", f64::INFINITY).is_err());
        assert!(idx.is_empty());
    }
}
