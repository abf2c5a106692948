//! Pattern definitions and field specs
//!
//! A pattern is a named domain schema (Sales Pipeline, Philosophy, ...) with
//! an ordered list of typed fields. Definitions are validated once, when the
//! registry loads them, and are immutable afterwards.

use crate::{FieldId, FieldType, FieldValue, PatternId, SchemaError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Field values of one pattern, keyed by field id.
pub type PatternFields = BTreeMap<FieldId, FieldValue>;

/// Declaration of a single typed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub id: FieldId,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default)]
    pub required: bool,
    /// Overrides the type default when a node is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldValue>,
}

impl FieldSpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            field_type,
            options: Vec::new(),
            min: None,
            max: None,
            required: false,
            default: None,
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_default(mut self, default: FieldValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Value a freshly created node holds for this field, in the field's
    /// storage shape.
    pub fn initial_value(&self) -> FieldValue {
        self.default
            .as_ref()
            .and_then(|default| self.accept(default).ok())
            .unwrap_or_else(|| FieldValue::default_for(self.field_type))
    }

    /// Type-appropriate empty value, ignoring any declared default.
    pub fn empty_value(&self) -> FieldValue {
        FieldValue::default_for(self.field_type)
    }

    /// Coerce `value` into this field's storage shape and check constraints.
    ///
    /// `Null` and blank text are always accepted (they clear the field).
    pub fn accept(&self, value: &FieldValue) -> Result<FieldValue, String> {
        if let FieldValue::Text(s) = value {
            if s.trim().is_empty() && !self.field_type.is_textual() {
                return Ok(FieldValue::Null);
            }
        }

        let coerced = value.coerce(self.field_type).ok_or_else(|| {
            format!(
                "cannot store {} value in {} field",
                value.type_name(),
                self.field_type
            )
        })?;

        match &coerced {
            FieldValue::Number(n) => {
                if let Some(min) = self.min {
                    if *n < min {
                        return Err(format!("{} is below minimum {}", n, min));
                    }
                }
                if let Some(max) = self.max {
                    if *n > max {
                        return Err(format!("{} is above maximum {}", n, max));
                    }
                }
            }
            FieldValue::Text(s) if self.field_type == FieldType::Select && !s.is_empty() => {
                if !self.options.iter().any(|o| o == s) {
                    return Err(format!("'{}' is not one of {:?}", s, self.options));
                }
            }
            _ => {}
        }

        Ok(coerced)
    }

    /// `accept` for a user edit: a required field cannot be cleared.
    ///
    /// `0` and `false` are real values and stay allowed.
    pub fn accept_edit(&self, value: &FieldValue) -> Result<FieldValue, String> {
        let accepted = self.accept(value)?;
        let cleared = match &accepted {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        };
        if self.required && cleared {
            return Err(format!("{} is required", self.label));
        }
        Ok(accepted)
    }

    /// Validate the spec itself.
    pub fn validate(&self, pattern: &PatternId) -> Result<(), SchemaError> {
        if self.id.trim().is_empty() {
            return Err(SchemaError::EmptyFieldId {
                pattern: pattern.clone(),
            });
        }

        if self.field_type == FieldType::Select && self.options.is_empty() {
            return Err(SchemaError::MissingOptions {
                pattern: pattern.clone(),
                field: self.id.clone(),
            });
        }

        if (self.min.is_some() || self.max.is_some()) && self.field_type != FieldType::Number {
            return Err(SchemaError::BoundsOnNonNumeric {
                pattern: pattern.clone(),
                field: self.id.clone(),
            });
        }

        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max || min.is_nan() || max.is_nan() {
                return Err(SchemaError::InvalidBounds {
                    pattern: pattern.clone(),
                    field: self.id.clone(),
                    min,
                    max,
                });
            }
        }

        if let Some(default) = &self.default {
            self.accept(default)
                .map_err(|reason| SchemaError::InvalidDefault {
                    pattern: pattern.clone(),
                    field: self.id.clone(),
                    reason,
                })?;
        }

        Ok(())
    }
}

/// A named domain schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternDefinition {
    pub id: PatternId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<FieldSpec>,
}

impl PatternDefinition {
    pub fn new(id: impl Into<PatternId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Look up a field spec by id.
    pub fn field(&self, field_id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.id == field_id)
    }

    pub fn field_ids(&self) -> impl Iterator<Item = &str> + Clone {
        self.fields.iter().map(|f| f.id.as_str())
    }

    /// Initial pattern data for a new node.
    pub fn default_fields(&self) -> PatternFields {
        self.fields
            .iter()
            .map(|f| (f.id.clone(), f.initial_value()))
            .collect()
    }

    /// Validate the pattern and every field spec.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.id.is_empty() {
            return Err(SchemaError::EmptyPatternId);
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            field.validate(&self.id)?;
            if !seen.insert(field.id.as_str()) {
                return Err(SchemaError::DuplicateField {
                    pattern: self.id.clone(),
                    field: field.id.clone(),
                });
            }
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
