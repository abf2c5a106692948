//! Identity types for PRISM records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 content hash for fingerprinting registries and snapshots.
pub type ContentHash = [u8; 32];

/// Field identifier within a pattern (e.g. `dealValue`).
pub type FieldId = String;

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

// ============================================================================
// NODE ID
// ============================================================================

/// Node identifier using UUIDv7 for timestamp-sortable IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Generate a new timestamp-sortable node id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// PATTERN ID
// ============================================================================

/// Identifier of a registered pattern (domain schema), e.g. `sales`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(String);

impl PatternId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PatternId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PatternId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for PatternId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PatternId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_is_v7() {
        let id = NodeId::new();
        assert_eq!(id.as_uuid().get_version_num(), 7);
    }

    #[test]
    fn test_node_ids_are_sortable() {
        let id1 = NodeId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = NodeId::new();
        assert!(id1 < id2);
    }

    #[test]
    fn test_pattern_id_serializes_as_plain_string() {
        let id = PatternId::from("sales");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"sales\"");
    }

    #[test]
    fn test_content_hash_is_stable() {
        let hash = compute_content_hash(b"hello world");
        assert_eq!(hash, compute_content_hash(b"hello world"));
        assert_ne!(hash, compute_content_hash(b"hello world!"));
    }
}
