//! Field values stored in pattern data and common fields

use crate::FieldType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire format for date values.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single field value.
///
/// Serialized untagged so pattern data stays a plain keyed JSON object:
/// `null`, `true`, `5000000`, `{"date": "2024-03-01"}`, `"Pragmatist"`.
/// Dates carry a key so text that happens to look like a date stays text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Date(#[serde(with = "keyed_date")] NaiveDate),
    Text(String),
}

mod keyed_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Keyed {
        date: NaiveDate,
    }

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        Keyed { date: *date }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        Keyed::deserialize(deserializer).map(|keyed| keyed.date)
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Null
    }
}

impl FieldValue {
    /// Type-appropriate empty default for a field type.
    pub fn default_for(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Number => FieldValue::Number(0.0),
            FieldType::Text | FieldType::Textarea | FieldType::Select => {
                FieldValue::Text(String::new())
            }
            FieldType::Checkbox => FieldValue::Bool(false),
            FieldType::Date => FieldValue::Null,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    /// Falsy values count as empty: null, blank text, zero, false.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Bool(b) => !b,
            FieldValue::Number(n) => *n == 0.0 || n.is_nan(),
            FieldValue::Date(_) => false,
            FieldValue::Text(s) => s.trim().is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Number(_) => "number",
            FieldValue::Date(_) => "date",
            FieldValue::Text(_) => "text",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().replace(',', "").parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            FieldValue::Text(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok(),
            _ => None,
        }
    }

    /// Convert this value into the storage shape of `field_type`.
    ///
    /// Returns `None` when no lossless conversion exists. `Null` converts to
    /// `Null` for every type.
    pub fn coerce(&self, field_type: FieldType) -> Option<FieldValue> {
        if matches!(self, FieldValue::Null) {
            return Some(FieldValue::Null);
        }
        match field_type {
            FieldType::Number => self
                .as_f64()
                .filter(|n| n.is_finite())
                .map(FieldValue::Number),
            FieldType::Date => self.as_date().map(FieldValue::Date),
            FieldType::Checkbox => match self {
                FieldValue::Bool(b) => Some(FieldValue::Bool(*b)),
                FieldValue::Number(n) => Some(FieldValue::Bool(*n != 0.0)),
                FieldValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "1" => Some(FieldValue::Bool(true)),
                    "false" | "no" | "0" | "" => Some(FieldValue::Bool(false)),
                    _ => None,
                },
                FieldValue::Date(_) | FieldValue::Null => None,
            },
            FieldType::Text | FieldType::Textarea | FieldType::Select => match self {
                FieldValue::Bool(_) => None,
                other => Some(FieldValue::Text(other.to_string())),
            },
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            FieldValue::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}
