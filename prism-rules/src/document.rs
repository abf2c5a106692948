//! Rule documents
//!
//! The registry's input: pattern definitions, common-field bridges, rule
//! sets, and the compatibility/hint tables, in YAML, JSON, or TOML.
//! serde does all of the parsing; unknown keys are rejected.

use crate::Transform;
use prism_core::{CommonKey, FieldId, FieldValue, PatternDefinition, PatternId, SchemaError};
use serde::{Deserialize, Serialize};

// ============================================================================
// DOCUMENT STRUCTS (The Schema)
// ============================================================================

/// Complete registry input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDocument {
    #[serde(default)]
    pub patterns: Vec<PatternDefinition>,
    #[serde(default)]
    pub bridges: Vec<BridgeDef>,
    #[serde(default)]
    pub rule_sets: Vec<RuleSetDef>,
    #[serde(default)]
    pub compatibility: Vec<CompatibilityDef>,
    #[serde(default)]
    pub hints: Vec<HintDef>,
}

/// Declares that `pattern.field` feeds the common key `common`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeDef {
    pub pattern: PatternId,
    pub field: FieldId,
    pub common: CommonKey,
}

/// Rules for translating one ordered pattern pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSetDef {
    pub from: PatternId,
    pub to: PatternId,
    #[serde(default)]
    pub mappings: Vec<MappingDef>,
    #[serde(default)]
    pub auto_generate: Vec<AutoGenerateDef>,
}

/// One target-field mapping. Exactly one of `source`, `common`, `compute`
/// must be set; `transform` applies to `source`/`common` copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingDef {
    pub target: FieldId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<FieldId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common: Option<CommonKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<ComputeDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

impl MappingDef {
    pub fn direct(target: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            source: Some(source.into()),
            common: None,
            compute: None,
            transform: None,
        }
    }

    pub fn common(target: impl Into<String>, key: CommonKey) -> Self {
        Self {
            target: target.into(),
            source: None,
            common: Some(key),
            compute: None,
            transform: None,
        }
    }

    pub fn compute(target: impl Into<String>, inputs: Vec<FieldRef>, transform: Transform) -> Self {
        Self {
            target: target.into(),
            source: None,
            common: None,
            compute: Some(ComputeDef { inputs, transform }),
            transform: None,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// A compute rule: a transform over declared inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComputeDef {
    pub inputs: Vec<FieldRef>,
    pub transform: Transform,
}

/// A value a compute rule reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRef {
    /// A field of the source pattern
    Source(FieldId),
    /// A common bridge key
    Common(CommonKey),
    /// A universal node attribute
    Attribute(NodeAttribute),
    /// A target field filled by a direct/common mapping of the same rule set
    Target(FieldId),
}

/// Universal node attributes rules may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAttribute {
    Name,
    Description,
}

/// Default for a target field with no source dependency. Exactly one of
/// `value` and `first_option` must be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutoGenerateDef {
    pub target: FieldId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
    #[serde(default)]
    pub first_option: bool,
}

impl AutoGenerateDef {
    pub fn value(target: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            target: target.into(),
            value: Some(value.into()),
            first_option: false,
        }
    }

    pub fn first_option(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            value: None,
            first_option: true,
        }
    }
}

/// Design-time expected preservation score for a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompatibilityDef {
    pub from: PatternId,
    pub to: PatternId,
    pub expected: u8,
}

/// Static adaptation guidance for a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HintDef {
    pub from: PatternId,
    pub to: PatternId,
    pub hints: Vec<String>,
}

// ============================================================================
// FORMATS
// ============================================================================

/// Serialization format of a rule document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
    Toml,
}

impl DocumentFormat {
    /// Pick a format from a file extension (`yaml`, `yml`, `json`, `toml`).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(DocumentFormat::Yaml),
            "json" => Some(DocumentFormat::Json),
            "toml" => Some(DocumentFormat::Toml),
            _ => None,
        }
    }
}

impl RuleDocument {
    /// Parse a document. Parse failures become `SchemaError::Malformed`.
    pub fn parse(format: DocumentFormat, content: &str) -> Result<Self, SchemaError> {
        let malformed = |reason: String| SchemaError::Malformed { reason };
        match format {
            // `{ source: endDate }` style enums need the singleton-map form in YAML.
            DocumentFormat::Yaml => serde_yaml::with::singleton_map_recursive::deserialize(
                serde_yaml::Deserializer::from_str(content),
            )
            .map_err(|e: serde_yaml::Error| malformed(e.to_string())),
            DocumentFormat::Json => serde_json::from_str(content).map_err(|e| malformed(e.to_string())),
            DocumentFormat::Toml => toml::from_str(content).map_err(|e| malformed(e.to_string())),
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, SchemaError> {
        Self::parse(DocumentFormat::Yaml, content)
    }

    pub fn from_json(content: &str) -> Result<Self, SchemaError> {
        Self::parse(DocumentFormat::Json, content)
    }

    pub fn from_toml(content: &str) -> Result<Self, SchemaError> {
        Self::parse(DocumentFormat::Toml, content)
    }

    /// Append another document's contents (e.g. one file per pattern).
    pub fn merge(mut self, other: RuleDocument) -> Self {
        self.patterns.extend(other.patterns);
        self.bridges.extend(other.bridges);
        self.rule_sets.extend(other.rule_sets);
        self.compatibility.extend(other.compatibility);
        self.hints.extend(other.hints);
        self
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::FieldType;

    const YAML: &str = r#"
patterns:
  - id: generic
    name: Generic Project
    fields:
      - { id: cost, label: Cost, type: number, min: 0 }
      - { id: endDate, label: End Date, type: date }
  - id: sales
    name: Sales Pipeline
    fields:
      - { id: dealValue, label: Deal Value, type: number }
      - { id: closeDate, label: Close Date, type: date }
      - { id: probability, label: Probability, type: number, min: 0, max: 100 }
bridges:
  - { pattern: generic, field: cost, common: monetaryValue }
rule_sets:
  - from: generic
    to: sales
    mappings:
      - target: dealValue
        common: monetaryValue
      - target: closeDate
        compute:
          inputs: [ { source: endDate } ]
          transform: { kind: date_offset, days: 14 }
    auto_generate:
      - { target: probability, value: 50 }
compatibility:
  - { from: generic, to: sales, expected: 90 }
hints:
  - from: generic
    to: sales
    hints: ["Treat cost as the deal's value."]
"#;

    #[test]
    fn test_parse_yaml_document() {
        let doc = RuleDocument::from_yaml(YAML).unwrap();
        assert_eq!(doc.patterns.len(), 2);
        assert_eq!(doc.patterns[0].fields[0].field_type, FieldType::Number);
        assert_eq!(doc.bridges[0].common, CommonKey::MonetaryValue);

        let rules = &doc.rule_sets[0];
        assert_eq!(rules.mappings[0].common, Some(CommonKey::MonetaryValue));
        let compute = rules.mappings[1].compute.as_ref().unwrap();
        assert_eq!(compute.inputs, vec![FieldRef::Source("endDate".to_string())]);
        assert_eq!(compute.transform, Transform::DateOffset { days: 14 });
        assert_eq!(rules.auto_generate[0].value, Some(FieldValue::Number(50.0)));
        assert_eq!(doc.compatibility[0].expected, 90);
    }

    #[test]
    fn test_yaml_field_refs_in_map_form() {
        let yaml = r#"
rule_sets:
  - from: generic
    to: film
    mappings:
      - target: logline
        compute:
          inputs:
            - { attribute: name }
            - { common: textContent }
            - target: director
          transform: { kind: template, template: "{0} {1} {2}" }
"#;
        let doc = RuleDocument::from_yaml(yaml).unwrap();
        let compute = doc.rule_sets[0].mappings[0].compute.as_ref().unwrap();
        assert_eq!(
            compute.inputs,
            vec![
                FieldRef::Attribute(NodeAttribute::Name),
                FieldRef::Common(CommonKey::TextContent),
                FieldRef::Target("director".to_string()),
            ]
        );
    }

    #[test]
    fn test_json_round_trip() {
        let doc = RuleDocument::from_yaml(YAML).unwrap();
        let json = serde_json::to_string(&doc).unwrap();
        let back = RuleDocument::from_json(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_parse_toml_document() {
        let toml_doc = r#"
[[patterns]]
id = "fitness"
name = "Fitness Plan"

[[patterns.fields]]
id = "sets"
label = "Sets"
type = "number"

[[rule_sets]]
from = "fitness"
to = "fitness"

[[rule_sets.mappings]]
target = "sets"
source = "sets"
"#;
        let doc = RuleDocument::from_toml(toml_doc).unwrap();
        assert_eq!(doc.patterns[0].id.as_str(), "fitness");
        assert_eq!(doc.rule_sets[0].mappings[0].source.as_deref(), Some("sets"));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = RuleDocument::from_yaml("patterns: []\nextras: 1\n").unwrap_err();
        assert!(matches!(err, SchemaError::Malformed { .. }));
    }

    #[test]
    fn test_unknown_field_type_rejected() {
        let yaml = "patterns:\n  - { id: p, name: P, fields: [ { id: a, label: A, type: currency } ] }\n";
        assert!(matches!(
            RuleDocument::from_yaml(yaml),
            Err(SchemaError::Malformed { .. })
        ));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_extension("yml"), Some(DocumentFormat::Yaml));
        assert_eq!(DocumentFormat::from_extension(".JSON"), Some(DocumentFormat::Json));
        assert_eq!(DocumentFormat::from_extension("toml"), Some(DocumentFormat::Toml));
        assert_eq!(DocumentFormat::from_extension("xml"), None);
    }
}
