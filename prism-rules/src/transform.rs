//! Transform kinds usable inside mapping rules
//!
//! Rules are data, not closures: every transform is one of a small set of
//! kinds whose inputs are declared up front, so the dependency graph of a
//! rule set can be checked statically.

use chrono::Duration;
use once_cell::sync::Lazy;
use prism_core::FieldValue;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\d+)\}").expect("Invalid placeholder regex"));

/// A pure value transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum Transform {
    /// Copy the single input unchanged.
    Passthrough,
    /// Multiply a number by `factor`.
    Scale { factor: f64 },
    /// Round a number to `digits` decimal places.
    Round { digits: u32 },
    /// Substitute `{0}`, `{1}`, ... with the inputs' text form.
    Template { template: String },
    /// Shift a date by a number of days.
    DateOffset { days: i64 },
    /// Map the input's text form through a table.
    Lookup {
        table: BTreeMap<String, FieldValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<FieldValue>,
    },
    /// Count whitespace-separated words of a text.
    WordCount,
    /// Add up the numeric inputs, skipping empty ones.
    Sum,
    /// The first non-empty input.
    FirstNonEmpty,
}

impl Transform {
    pub fn kind(&self) -> &'static str {
        match self {
            Transform::Passthrough => "passthrough",
            Transform::Scale { .. } => "scale",
            Transform::Round { .. } => "round",
            Transform::Template { .. } => "template",
            Transform::DateOffset { .. } => "date_offset",
            Transform::Lookup { .. } => "lookup",
            Transform::WordCount => "word_count",
            Transform::Sum => "sum",
            Transform::FirstNonEmpty => "first_non_empty",
        }
    }

    /// Check that the transform can be applied to `input_count` inputs.
    pub fn check_arity(&self, input_count: usize) -> Result<(), String> {
        match self {
            Transform::Passthrough
            | Transform::Scale { .. }
            | Transform::Round { .. }
            | Transform::DateOffset { .. }
            | Transform::Lookup { .. }
            | Transform::WordCount => {
                if input_count != 1 {
                    return Err(format!(
                        "{} takes exactly one input, got {}",
                        self.kind(),
                        input_count
                    ));
                }
            }
            Transform::Template { template } => {
                if let Some(max) = max_placeholder(template) {
                    if max >= input_count {
                        return Err(format!(
                            "template references {{{}}} but only {} inputs are declared",
                            max, input_count
                        ));
                    }
                }
            }
            Transform::Sum | Transform::FirstNonEmpty => {
                if input_count == 0 {
                    return Err(format!("{} needs at least one input", self.kind()));
                }
            }
        }

        if let Transform::Scale { factor } = self {
            if !factor.is_finite() {
                return Err("scale factor must be finite".to_string());
            }
        }
        Ok(())
    }

    /// Apply the transform.
    pub fn apply(&self, inputs: &[FieldValue]) -> Result<FieldValue, String> {
        let first = inputs.first().unwrap_or(&FieldValue::Null);
        match self {
            Transform::Passthrough => Ok(first.clone()),
            Transform::Scale { factor } => number(first, self).map(|n| FieldValue::Number(n * factor)),
            Transform::Round { digits } => {
                let n = number(first, self)?;
                let scale = 10f64.powi(*digits as i32);
                Ok(FieldValue::Number((n * scale).round() / scale))
            }
            Transform::Template { template } => {
                let rendered = PLACEHOLDER.replace_all(template, |caps: &regex::Captures<'_>| {
                    caps[1]
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| inputs.get(i))
                        .map(|v| v.to_string())
                        .unwrap_or_default()
                });
                Ok(FieldValue::Text(rendered.trim().to_string()))
            }
            Transform::DateOffset { days } => {
                let date = first
                    .as_date()
                    .ok_or_else(|| format!("date_offset needs a date, got {}", first.type_name()))?;
                Duration::try_days(*days)
                    .and_then(|offset| date.checked_add_signed(offset))
                    .map(FieldValue::Date)
                    .ok_or_else(|| "date out of range".to_string())
            }
            Transform::Lookup { table, default } => {
                let key = first.to_string();
                table
                    .get(key.trim())
                    .or(default.as_ref())
                    .cloned()
                    .ok_or_else(|| format!("no lookup entry for '{}'", key))
            }
            Transform::WordCount => match first {
                FieldValue::Text(s) => Ok(FieldValue::Number(s.split_whitespace().count() as f64)),
                FieldValue::Null => Ok(FieldValue::Number(0.0)),
                other => Err(format!("word_count needs text, got {}", other.type_name())),
            },
            Transform::Sum => {
                let mut total = 0.0;
                for value in inputs.iter().filter(|v| !v.is_empty()) {
                    total += number(value, self)?;
                }
                Ok(FieldValue::Number(total))
            }
            Transform::FirstNonEmpty => Ok(inputs
                .iter()
                .find(|v| !v.is_empty())
                .cloned()
                .unwrap_or(FieldValue::Null)),
        }
    }
}

fn number(value: &FieldValue, transform: &Transform) -> Result<f64, String> {
    value.as_f64().ok_or_else(|| {
        format!(
            "{} needs a number, got {}",
            transform.kind(),
            value.type_name()
        )
    })
}

fn max_placeholder(template: &str) -> Option<usize> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|caps| caps[1].parse::<usize>().ok())
        .max()
}

// ============================================================================
// TESTS
// ============================================================================
