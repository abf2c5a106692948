//! Universal record model
//!
//! A node keeps three layers:
//! 1. identity and tree structure (`id`, `name`, `children`, ...)
//! 2. `common_fields`, the pattern-agnostic bridge
//! 3. `pattern_data`, one field map per pattern ever applied
//!
//! The pattern-context layers are private so the invariants hold: the
//! original pattern's data and the current view's data are always present,
//! pattern data is never deleted, and history is append-only.

use crate::{
    CommonFields, CommonKey, FieldId, FieldValue, HistoryAction, HistoryEntry,
    HistoryOrderError, NodeId, NodeType, PatternDefinition, PatternFields, PatternHistory,
    PatternId, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Universal node attributes readable through `get_field`.
pub const NODE_ATTRIBUTES: [&str; 2] = ["name", "description"];

/// The translatable unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub node_type: NodeType,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(default)]
    pub collapsed: bool,

    original_pattern: PatternId,
    current_view_pattern: PatternId,
    pattern_history: PatternHistory,
    common_fields: CommonFields,
    pattern_data: BTreeMap<PatternId, PatternFields>,

    created_at: Timestamp,
    last_modified: Timestamp,
}

impl Node {
    /// Create a node under `pattern` with default field values and a single
    /// `created` history entry.
    pub fn new(
        name: impl Into<String>,
        node_type: NodeType,
        parent_id: Option<NodeId>,
        pattern: &PatternDefinition,
    ) -> Self {
        let now = PatternHistory::new().next_timestamp();
        let pattern_history = PatternHistory::starting_with(HistoryEntry::new(
            now,
            pattern.id.clone(),
            HistoryAction::Created,
        ));

        let mut pattern_data = BTreeMap::new();
        pattern_data.insert(pattern.id.clone(), pattern.default_fields());

        Self {
            id: NodeId::new(),
            name: name.into(),
            description: String::new(),
            node_type,
            parent_id,
            children: Vec::new(),
            collapsed: false,
            original_pattern: pattern.id.clone(),
            current_view_pattern: pattern.id.clone(),
            pattern_history,
            common_fields: CommonFields::new(),
            pattern_data,
            created_at: now,
            last_modified: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    // === Read access ===

    pub fn original_pattern(&self) -> &PatternId {
        &self.original_pattern
    }

    pub fn current_view_pattern(&self) -> &PatternId {
        &self.current_view_pattern
    }

    /// Whether the node is currently viewed under a pattern other than the
    /// one it was authored in.
    pub fn is_translated(&self) -> bool {
        self.original_pattern != self.current_view_pattern
    }

    pub fn history(&self) -> &PatternHistory {
        &self.pattern_history
    }

    pub fn common_fields(&self) -> &CommonFields {
        &self.common_fields
    }

    pub fn pattern_data(&self, pattern: &PatternId) -> Option<&PatternFields> {
        self.pattern_data.get(pattern)
    }

    pub fn has_pattern_data(&self, pattern: &PatternId) -> bool {
        self.pattern_data.contains_key(pattern)
    }

    /// Patterns with stored data, in id order.
    pub fn patterns(&self) -> impl Iterator<Item = &PatternId> {
        self.pattern_data.keys()
    }

    /// Field values of the current view.
    pub fn current_fields(&self) -> &PatternFields {
        self.pattern_data
            .get(&self.current_view_pattern)
            .unwrap_or(&EMPTY_FIELDS)
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn last_modified(&self) -> Timestamp {
        self.last_modified
    }

    /// Resolve a field for display.
    ///
    /// Order: the current view's value if non-empty, then the matching
    /// common bridge key if non-empty, then a universal attribute
    /// (`name`, `description`). If nothing better exists the stored value
    /// (possibly a type default) is returned, else `Null`.
    ///
    /// Stored `0`, `false` and blank text count as unset here, since type
    /// defaults are stored the same way; a non-empty common value shows
    /// through them.
    pub fn get_field(&self, field_id: &str) -> FieldValue {
        let stored = self.current_fields().get(field_id);
        if let Some(value) = stored {
            if !value.is_empty() {
                return value.clone();
            }
        }

        if let Some(value) = self.common_fields.get_by_name(field_id) {
            if !value.is_empty() {
                return value.clone();
            }
        }

        match field_id {
            "name" if !self.name.is_empty() => return FieldValue::text(self.name.clone()),
            "description" if !self.description.is_empty() => {
                return FieldValue::text(self.description.clone())
            }
            _ => {}
        }

        stored.cloned().unwrap_or(FieldValue::Null)
    }

    // === Mutation (invariant-preserving) ===

    /// Append a history entry, rejecting out-of-order timestamps.
    pub fn append_history(&mut self, entry: HistoryEntry) -> Result<(), HistoryOrderError> {
        self.pattern_history.append(entry)
    }

    /// Record a user edit on the current view.
    ///
    /// The caller has already validated `field_id` and `value` against the
    /// current pattern's spec. `bridge` names the common key the field feeds,
    /// if any.
    pub fn record_edit(
        &mut self,
        field_id: &str,
        value: FieldValue,
        bridge: Option<CommonKey>,
    ) -> Result<(), HistoryOrderError> {
        let timestamp = self.pattern_history.next_timestamp();
        let entry = HistoryEntry::new(
            timestamp,
            self.current_view_pattern.clone(),
            HistoryAction::UserEdited,
        )
        .with_fields_modified(vec![field_id.to_string()]);
        self.pattern_history.append(entry)?;

        if let Some(key) = bridge {
            self.common_fields.set(key, value.clone());
        }
        self.pattern_data
            .entry(self.current_view_pattern.clone())
            .or_default()
            .insert(field_id.to_string(), value);
        self.last_modified = timestamp;
        Ok(())
    }

    /// Store translated data for `pattern`, make it the current view, and
    /// append an `auto-translated` entry.
    ///
    /// The original pattern's data is never replaced; if `pattern` is the
    /// original pattern only the view moves.
    pub fn store_translation(
        &mut self,
        pattern: &PatternId,
        fields: PatternFields,
        fields_modified: Vec<FieldId>,
        score: u8,
    ) -> Result<(), HistoryOrderError> {
        let timestamp = self.pattern_history.next_timestamp();
        let entry = HistoryEntry::new(timestamp, pattern.clone(), HistoryAction::AutoTranslated)
            .with_fields_modified(fields_modified)
            .with_preservation_score(score);
        self.pattern_history.append(entry)?;

        if pattern != &self.original_pattern {
            self.pattern_data.insert(pattern.clone(), fields);
        }
        self.current_view_pattern = pattern.clone();
        self.last_modified = timestamp;
        Ok(())
    }

    /// Move the view to a pattern that already has data, appending a
    /// `switched` entry. Returns `false` (and does nothing) if there is no
    /// data for `pattern` or it is already the current view.
    pub fn switch_view(&mut self, pattern: &PatternId) -> Result<bool, HistoryOrderError> {
        if !self.pattern_data.contains_key(pattern) || &self.current_view_pattern == pattern {
            return Ok(false);
        }
        let timestamp = self.pattern_history.next_timestamp();
        self.pattern_history.append(HistoryEntry::new(
            timestamp,
            pattern.clone(),
            HistoryAction::Switched,
        ))?;
        self.current_view_pattern = pattern.clone();
        Ok(true)
    }

    // === Tree structure ===

    /// Attach `child`, taking ownership and pointing its parent at this node.
    pub fn add_child(&mut self, mut child: Node) {
        child.parent_id = Some(self.id);
        self.children.push(child);
    }

    /// Detach and return a direct child. Dropping the returned node frees
    /// its pattern data and history.
    pub fn remove_child(&mut self, id: NodeId) -> Option<Node> {
        let index = self.children.iter().position(|c| c.id == id)?;
        Some(self.children.remove(index))
    }

    /// Number of nodes in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Node::subtree_len).sum::<usize>()
    }

    /// Depth-first search for a node in this subtree.
    pub fn find(&self, id: NodeId) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }
}

static EMPTY_FIELDS: PatternFields = BTreeMap::new();

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldSpec, FieldType};

    fn generic() -> PatternDefinition {
        PatternDefinition::new("generic", "Generic Project")
            .with_field(FieldSpec::new("cost", "Cost", FieldType::Number))
            .with_field(FieldSpec::new("notes", "Notes", FieldType::Textarea))
            .with_field(FieldSpec::new("done", "Done", FieldType::Checkbox))
    }

    #[test]
    fn test_new_node_initial_state() {
        let node = Node::new("Launch", NodeType::Item, None, &generic());
        let generic_id = PatternId::from("generic");

        assert_eq!(node.original_pattern(), &generic_id);
        assert_eq!(node.current_view_pattern(), &generic_id);
        assert!(!node.is_translated());
        assert_eq!(node.history().len(), 1);
        assert_eq!(node.history().last().unwrap().action, HistoryAction::Created);

        let fields = node.pattern_data(&generic_id).unwrap();
        assert_eq!(fields["cost"], FieldValue::Number(0.0));
        assert_eq!(fields["notes"], FieldValue::text(""));
        assert_eq!(fields["done"], FieldValue::Bool(false));
        assert!(node.common_fields().iter().all(|(_, v)| *v == FieldValue::Null));
    }

    #[test]
    fn test_record_edit_updates_bridge_and_history() {
        let mut node = Node::new("Launch", NodeType::Item, None, &generic());
        node.record_edit("cost", FieldValue::Number(5.0), Some(CommonKey::MonetaryValue))
            .unwrap();

        assert_eq!(node.current_fields()["cost"], FieldValue::Number(5.0));
        assert_eq!(
            node.common_fields().get(CommonKey::MonetaryValue),
            &FieldValue::Number(5.0)
        );
        let last = node.history().last().unwrap();
        assert_eq!(last.action, HistoryAction::UserEdited);
        assert_eq!(last.fields_modified, vec!["cost".to_string()]);
        assert_eq!(node.last_modified(), last.timestamp);
    }

    #[test]
    fn test_get_field_fallback_order() {
        let mut node =
            Node::new("Launch", NodeType::Item, None, &generic()).with_description("Q3 launch");

        // Stored default is empty and no common value: stored default returned.
        assert_eq!(node.get_field("cost"), FieldValue::Number(0.0));

        // Common bridge key name falls through to common fields.
        node.record_edit("cost", FieldValue::Number(9.0), Some(CommonKey::MonetaryValue))
            .unwrap();
        assert_eq!(node.get_field("monetaryValue"), FieldValue::Number(9.0));

        // Universal attributes.
        assert_eq!(node.get_field("name"), FieldValue::text("Launch"));
        assert_eq!(node.get_field("description"), FieldValue::text("Q3 launch"));
        assert_eq!(node.get_field("nonexistent"), FieldValue::Null);
    }

    #[test]
    fn test_append_history_rejects_backdated_entry() {
        let mut node = Node::new("Launch", NodeType::Item, None, &generic());
        let created = node.created_at();
        let backdated = HistoryEntry::new(
            created - chrono::Duration::seconds(1),
            PatternId::from("generic"),
            HistoryAction::UserEdited,
        );
        let err = node.append_history(backdated).unwrap_err();
        assert_eq!(err.last, created);
        assert_eq!(node.history().len(), 1);

        let on_time = HistoryEntry::new(created, PatternId::from("generic"), HistoryAction::UserEdited);
        assert_eq!(node.append_history(on_time), Ok(()));
        assert_eq!(node.history().len(), 2);
    }

    #[test]
    fn test_store_translation_never_replaces_original() {
        let mut node = Node::new("Launch", NodeType::Item, None, &generic());
        node.record_edit("cost", FieldValue::Number(7.0), None).unwrap();
        let original = node.pattern_data(&PatternId::from("generic")).cloned();

        let generic_id = PatternId::from("generic");
        node.store_translation(&generic_id, PatternFields::new(), vec![], 10)
            .unwrap();
        assert_eq!(node.pattern_data(&generic_id).cloned(), original);
    }

    #[test]
    fn test_switch_view_requires_data() {
        let mut node = Node::new("Launch", NodeType::Item, None, &generic());
        let sales = PatternId::from("sales");
        assert_eq!(node.switch_view(&sales), Ok(false));

        node.store_translation(&sales, PatternFields::new(), vec![], 50).unwrap();
        let generic_id = PatternId::from("generic");
        assert_eq!(node.switch_view(&generic_id), Ok(true));
        assert_eq!(node.current_view_pattern(), &generic_id);
        assert_eq!(node.history().last().unwrap().action, HistoryAction::Switched);
    }

    #[test]
    fn test_tree_ownership() {
        let def = generic();
        let mut root = Node::new("Root", NodeType::Root, None, &def);
        let child = Node::new("Phase 1", NodeType::Phase, None, &def);
        let child_id = child.id;
        root.add_child(child);

        assert_eq!(root.subtree_len(), 2);
        assert_eq!(root.find(child_id).unwrap().parent_id, Some(root.id));

        let removed = root.remove_child(child_id).unwrap();
        assert_eq!(removed.id, child_id);
        assert_eq!(root.subtree_len(), 1);
    }

    #[test]
    fn test_get_field_treats_stored_zero_as_unset() {
        let def = PatternDefinition::new("sales", "Sales")
            .with_field(FieldSpec::new("probability", "Probability", FieldType::Number));
        let mut node = Node::new("Renewal", NodeType::Item, None, &def);

        node.record_edit("probability", FieldValue::Number(40.0), Some(CommonKey::Probability))
            .unwrap();
        node.record_edit("probability", FieldValue::Number(0.0), None).unwrap();
        assert_eq!(node.get_field("probability"), FieldValue::Number(40.0));

        node.record_edit("probability", FieldValue::Number(0.0), Some(CommonKey::Probability))
            .unwrap();
        assert_eq!(node.get_field("probability"), FieldValue::Number(0.0));
    }

    #[test]
    fn test_node_serializes_to_plain_json() {
        let node = Node::new("Launch", NodeType::Item, None, &generic());
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["originalPattern"], "generic");
        assert!(json["patternData"]["generic"].is_object());
        assert!(json["patternHistory"].is_array());
        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }
}
