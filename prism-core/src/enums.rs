//! Enum types for PRISM records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error when parsing an enum from its wire string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for EnumParseError {}

fn normalize_token(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace(['_', ' '], "-")
}

// ============================================================================
// FIELD TYPE
// ============================================================================

/// Field types a pattern may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Single-line text
    Text,
    /// Multi-line text
    Textarea,
    /// Numeric value (stored as f64)
    Number,
    /// Calendar date (YYYY-MM-DD)
    Date,
    /// One of a declared list of options
    Select,
    /// Boolean flag
    Checkbox,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
        }
    }

    /// Whether values of this type are stored as text.
    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::Text | FieldType::Textarea | FieldType::Select)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "text" => Ok(FieldType::Text),
            "textarea" => Ok(FieldType::Textarea),
            "number" => Ok(FieldType::Number),
            "date" => Ok(FieldType::Date),
            "select" => Ok(FieldType::Select),
            "checkbox" => Ok(FieldType::Checkbox),
            _ => Err(EnumParseError {
                kind: "field type",
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// NODE TYPE
// ============================================================================

/// Position of a node in the tree hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Root,
    Phase,
    Item,
    Subtask,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Root => "root",
            NodeType::Phase => "phase",
            NodeType::Item => "item",
            NodeType::Subtask => "subtask",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "root" => Ok(NodeType::Root),
            "phase" => Ok(NodeType::Phase),
            "item" => Ok(NodeType::Item),
            "subtask" => Ok(NodeType::Subtask),
            _ => Err(EnumParseError {
                kind: "node type",
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// HISTORY ACTION
// ============================================================================

/// What happened to a node when a history entry was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryAction {
    /// Node was created under this pattern
    Created,
    /// View moved to a pattern that already had data
    Switched,
    /// Pattern data was produced by the translation executor
    AutoTranslated,
    /// A user edited fields while viewing this pattern
    UserEdited,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Created => "created",
            HistoryAction::Switched => "switched",
            HistoryAction::AutoTranslated => "auto-translated",
            HistoryAction::UserEdited => "user-edited",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryAction {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "created" => Ok(HistoryAction::Created),
            "switched" => Ok(HistoryAction::Switched),
            "auto-translated" => Ok(HistoryAction::AutoTranslated),
            "user-edited" => Ok(HistoryAction::UserEdited),
            _ => Err(EnumParseError {
                kind: "history action",
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// COMPATIBILITY TIER
// ============================================================================

/// Coarse quality bucket for a pattern pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Low,
    Medium,
    High,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Low => "LOW",
            Tier::Medium => "MEDIUM",
            Tier::High => "HIGH",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
