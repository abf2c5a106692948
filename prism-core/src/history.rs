//! Append-only pattern history
//!
//! Every pattern ever applied to a node leaves an entry here. Entries are
//! never edited or removed; timestamps never go backwards.

use crate::{FieldId, HistoryAction, HistoryOrderError, PatternId, Timestamp};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: Timestamp,
    pub pattern: PatternId,
    pub action: HistoryAction,
    #[serde(default)]
    pub fields_modified: Vec<FieldId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preservation_score: Option<u8>,
}

impl HistoryEntry {
    pub fn new(timestamp: Timestamp, pattern: PatternId, action: HistoryAction) -> Self {
        Self {
            timestamp,
            pattern,
            action,
            fields_modified: Vec::new(),
            preservation_score: None,
        }
    }

    pub fn with_fields_modified(mut self, fields: Vec<FieldId>) -> Self {
        self.fields_modified = fields;
        self
    }

    pub fn with_preservation_score(mut self, score: u8) -> Self {
        self.preservation_score = Some(score.min(100));
        self
    }
}

/// Time-ordered, append-only list of history entries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<HistoryEntry>", into = "Vec<HistoryEntry>")]
pub struct PatternHistory {
    entries: Vec<HistoryEntry>,
}

impl PatternHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A history whose first entry is `entry`.
    pub fn starting_with(entry: HistoryEntry) -> Self {
        Self {
            entries: vec![entry],
        }
    }

    /// Append an entry, rejecting it if it is older than the last one.
    pub fn append(&mut self, entry: HistoryEntry) -> Result<(), HistoryOrderError> {
        if let Some(last) = self.entries.last() {
            if entry.timestamp < last.timestamp {
                return Err(HistoryOrderError {
                    attempted: entry.timestamp,
                    last: last.timestamp,
                });
            }
        }
        self.entries.push(entry);
        Ok(())
    }

    /// A timestamp strictly after the last entry, tracking wall-clock time.
    pub fn next_timestamp(&self) -> Timestamp {
        let now = Utc::now();
        match self.entries.last() {
            Some(last) if now <= last.timestamp => last.timestamp + Duration::microseconds(1),
            _ => now,
        }
    }

    /// Entries in insertion order, optionally restricted to one pattern.
    ///
    /// The iterator is a pure view: cloning it restarts the walk.
    pub fn query<'a>(
        &'a self,
        pattern: Option<&'a PatternId>,
    ) -> impl Iterator<Item = &'a HistoryEntry> + Clone + 'a {
        self.entries
            .iter()
            .filter(move |entry| pattern.map_or(true, |p| &entry.pattern == p))
    }

    /// Most recent `auto-translated` entry for `pattern`.
    pub fn latest_translation(&self, pattern: &PatternId) -> Option<&HistoryEntry> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.action == HistoryAction::AutoTranslated && &e.pattern == pattern)
    }

    pub fn latest_score(&self, pattern: &PatternId) -> Option<u8> {
        self.latest_translation(pattern)
            .and_then(|e| e.preservation_score)
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HistoryEntry> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[HistoryEntry] {
        &self.entries
    }
}

impl TryFrom<Vec<HistoryEntry>> for PatternHistory {
    type Error = HistoryOrderError;

    fn try_from(entries: Vec<HistoryEntry>) -> Result<Self, Self::Error> {
        let mut history = PatternHistory::new();
        for entry in entries {
            history.append(entry)?;
        }
        Ok(history)
    }
}

impl From<PatternHistory> for Vec<HistoryEntry> {
    fn from(history: PatternHistory) -> Self {
        history.entries
    }
}

impl<'a> IntoIterator for &'a PatternHistory {
    type Item = &'a HistoryEntry;
    type IntoIter = std::slice::Iter<'a, HistoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ts: Timestamp, pattern: &str, action: HistoryAction) -> HistoryEntry {
        HistoryEntry::new(ts, PatternId::from(pattern), action)
    }

    #[test]
    fn test_append_rejects_older_timestamp() {
        let now = Utc::now();
        let mut history = PatternHistory::new();
        history.append(entry(now, "generic", HistoryAction::Created)).unwrap();

        let err = history
            .append(entry(now - Duration::seconds(1), "generic", HistoryAction::UserEdited))
            .unwrap_err();
        assert_eq!(err.last, now);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_append_accepts_equal_timestamp() {
        let now = Utc::now();
        let mut history = PatternHistory::new();
        history.append(entry(now, "generic", HistoryAction::Created)).unwrap();
        history.append(entry(now, "generic", HistoryAction::UserEdited)).unwrap();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_next_timestamp_is_strictly_increasing() {
        let mut history = PatternHistory::new();
        let far_future = Utc::now() + Duration::hours(1);
        history.append(entry(far_future, "generic", HistoryAction::Created)).unwrap();
        let next = history.next_timestamp();
        assert!(next > far_future);
    }

    #[test]
    fn test_query_filters_and_restarts() {
        let now = Utc::now();
        let mut history = PatternHistory::new();
        history.append(entry(now, "generic", HistoryAction::Created)).unwrap();
        history.append(entry(now, "sales", HistoryAction::AutoTranslated)).unwrap();
        history.append(entry(now, "generic", HistoryAction::UserEdited)).unwrap();

        let generic = PatternId::from("generic");
        let view = history.query(Some(&generic));
        assert_eq!(view.clone().count(), 2);
        assert_eq!(view.count(), 2);
        assert_eq!(history.query(None).count(), 3);
    }

    #[test]
    fn test_latest_score() {
        let now = Utc::now();
        let mut history = PatternHistory::new();
        history
            .append(entry(now, "sales", HistoryAction::AutoTranslated).with_preservation_score(70))
            .unwrap();
        history
            .append(entry(now, "sales", HistoryAction::AutoTranslated).with_preservation_score(91))
            .unwrap();
        assert_eq!(history.latest_score(&PatternId::from("sales")), Some(91));
        assert_eq!(history.latest_score(&PatternId::from("generic")), None);
    }

    #[test]
    fn test_deserialize_rejects_out_of_order() {
        let json = r#"[
            {"timestamp":"2025-01-02T00:00:00Z","pattern":"generic","action":"created","fieldsModified":[]},
            {"timestamp":"2025-01-01T00:00:00Z","pattern":"generic","action":"user-edited","fieldsModified":["cost"]}
        ]"#;
        assert!(serde_json::from_str::<PatternHistory>(json).is_err());
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut history = PatternHistory::new();
        history
            .append(
                entry(Utc::now(), "sales", HistoryAction::AutoTranslated)
                    .with_fields_modified(vec!["dealValue".to_string()])
                    .with_preservation_score(88),
            )
            .unwrap();
        let json = serde_json::to_string(&history).unwrap();
        assert!(json.contains("\"auto-translated\""));
        assert!(json.contains("\"preservationScore\":88"));
        let back: PatternHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, history);
    }
}
