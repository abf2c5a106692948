//! Pattern-agnostic bridge layer
//!
//! `CommonFields` relates semantically similar fields across unrelated
//! patterns (a sales `dealValue` and a project `cost` both bridge to
//! `monetaryValue`). Rules may read from it as an intermediate hop.

use crate::{EnumParseError, FieldValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The fixed set of common bridge keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommonKey {
    MonetaryValue,
    TimeEstimate,
    Probability,
    PersonName,
    TextContent,
    WordCount,
    DraftStatus,
    RiskLevel,
    DueDate,
    StartDate,
    Status,
    Priority,
    Location,
    Category,
    Quantity,
}

impl CommonKey {
    pub const ALL: [CommonKey; 15] = [
        CommonKey::MonetaryValue,
        CommonKey::TimeEstimate,
        CommonKey::Probability,
        CommonKey::PersonName,
        CommonKey::TextContent,
        CommonKey::WordCount,
        CommonKey::DraftStatus,
        CommonKey::RiskLevel,
        CommonKey::DueDate,
        CommonKey::StartDate,
        CommonKey::Status,
        CommonKey::Priority,
        CommonKey::Location,
        CommonKey::Category,
        CommonKey::Quantity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommonKey::MonetaryValue => "monetaryValue",
            CommonKey::TimeEstimate => "timeEstimate",
            CommonKey::Probability => "probability",
            CommonKey::PersonName => "personName",
            CommonKey::TextContent => "textContent",
            CommonKey::WordCount => "wordCount",
            CommonKey::DraftStatus => "draftStatus",
            CommonKey::RiskLevel => "riskLevel",
            CommonKey::DueDate => "dueDate",
            CommonKey::StartDate => "startDate",
            CommonKey::Status => "status",
            CommonKey::Priority => "priority",
            CommonKey::Location => "location",
            CommonKey::Category => "category",
            CommonKey::Quantity => "quantity",
        }
    }
}

impl fmt::Display for CommonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommonKey {
    type Err = EnumParseError;

    // Exact match only: field ids are case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommonKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| EnumParseError {
                kind: "common key",
                value: s.to_string(),
            })
    }
}

/// Values of every common bridge key. All keys start as `Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommonFields(BTreeMap<CommonKey, FieldValue>);

impl Default for CommonFields {
    fn default() -> Self {
        Self(
            CommonKey::ALL
                .iter()
                .map(|key| (*key, FieldValue::Null))
                .collect(),
        )
    }
}

impl CommonFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: CommonKey) -> &FieldValue {
        self.0.get(&key).unwrap_or(&FieldValue::Null)
    }

    /// Look up by wire name; `None` if `name` is not a bridge key.
    pub fn get_by_name(&self, name: &str) -> Option<&FieldValue> {
        name.parse::<CommonKey>().ok().map(|key| self.get(key))
    }

    pub fn set(&mut self, key: CommonKey, value: FieldValue) {
        self.0.insert(key, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (CommonKey, &FieldValue)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_keys_start_null() {
        let common = CommonFields::new();
        assert_eq!(common.iter().count(), CommonKey::ALL.len());
        assert!(common.iter().all(|(_, v)| *v == FieldValue::Null));
    }

    #[test]
    fn test_lookup_by_name() {
        let mut common = CommonFields::new();
        common.set(CommonKey::MonetaryValue, FieldValue::Number(10.0));
        assert_eq!(
            common.get_by_name("monetaryValue"),
            Some(&FieldValue::Number(10.0))
        );
        assert_eq!(common.get_by_name("MonetaryValue"), None);
        assert_eq!(common.get_by_name("dealValue"), None);
    }

    #[test]
    fn test_wire_names_match_serde() {
        for key in CommonKey::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
    }

    #[test]
    fn test_common_fields_serialize_as_plain_object() {
        let json = serde_json::to_value(CommonFields::new()).unwrap();
        assert!(json.is_object());
        assert!(json.get("riskLevel").unwrap().is_null());
    }
}
