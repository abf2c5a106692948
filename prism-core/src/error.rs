//! Error types for PRISM operations

use crate::{NodeId, PatternId, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schema registry errors. Raised synchronously while loading patterns,
/// bridges, and rule sets; fatal for the registration call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("Pattern id must not be empty")]
    EmptyPatternId,

    #[error("Duplicate pattern: {pattern}")]
    DuplicatePattern { pattern: PatternId },

    #[error("Pattern {pattern} declares a field with an empty id")]
    EmptyFieldId { pattern: PatternId },

    #[error("Duplicate field {field} in pattern {pattern}")]
    DuplicateField { pattern: PatternId, field: String },

    #[error("Select field {field} in pattern {pattern} declares no options")]
    MissingOptions { pattern: PatternId, field: String },

    #[error("Field {field} in pattern {pattern} has min {min} greater than max {max}")]
    InvalidBounds {
        pattern: PatternId,
        field: String,
        min: f64,
        max: f64,
    },

    #[error("Field {field} in pattern {pattern} declares bounds but is not a number")]
    BoundsOnNonNumeric { pattern: PatternId, field: String },

    #[error("Invalid default for {field} in pattern {pattern}: {reason}")]
    InvalidDefault {
        pattern: PatternId,
        field: String,
        reason: String,
    },

    #[error("Undefined reference: {kind} '{name}' is not defined")]
    UndefinedReference { kind: String, name: String },

    #[error("Duplicate rule set for {from} -> {to}")]
    DuplicateRuleSet { from: PatternId, to: PatternId },

    #[error("Type mismatch for {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid rule for {field}: {reason}")]
    InvalidRule { field: String, reason: String },

    #[error("Malformed rule document: {reason}")]
    Malformed { reason: String },
}

/// A compute mapping depends on another compute target of the same rule set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Cyclic compute dependency in rule set {from} -> {to}: {}", .cycle.join(" -> "))]
pub struct CyclicComputeError {
    pub from: PatternId,
    pub to: PatternId,
    pub cycle: Vec<String>,
}

/// A call referenced a pattern id the registry does not know.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown pattern: {pattern}")]
pub struct UnknownPatternError {
    pub pattern: PatternId,
}

/// A translation named a source pattern the node holds no data for.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Node {node} has no data for pattern {pattern}")]
pub struct MissingPatternDataError {
    pub node: NodeId,
    pub pattern: PatternId,
}

/// A write targeted a field the current pattern does not declare.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown field {field} for pattern {pattern}")]
pub struct UnknownFieldError {
    pub pattern: PatternId,
    pub field: String,
}

/// A write carried a value that does not fit the field's spec.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid value for {field} in pattern {pattern}: {reason}")]
pub struct FieldValueError {
    pub pattern: PatternId,
    pub field: String,
    pub reason: String,
}

/// A compute or auto-generate rule failed for one field.
///
/// Recovered locally: the field falls back to its type default and the
/// translation still completes. Serializable so it can travel with the
/// resolution that recorded it.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("Mapping failed for {target_field}: {reason}")]
pub struct MappingError {
    pub target_field: String,
    pub reason: String,
}

/// An entry was appended with a timestamp earlier than the last one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("History out of order: attempted {attempted}, last recorded {last}")]
pub struct HistoryOrderError {
    pub attempted: Timestamp,
    pub last: Timestamp,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all PRISM errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PrismError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("{0}")]
    CyclicCompute(#[from] CyclicComputeError),

    #[error("{0}")]
    UnknownPattern(#[from] UnknownPatternError),

    #[error("{0}")]
    MissingPatternData(#[from] MissingPatternDataError),

    #[error("{0}")]
    UnknownField(#[from] UnknownFieldError),

    #[error("{0}")]
    FieldValue(#[from] FieldValueError),

    #[error("{0}")]
    HistoryOrder(#[from] HistoryOrderError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for PRISM operations.
pub type PrismResult<T> = Result<T, PrismError>;

// =============================================================================
// TESTS
// =============================================================================
