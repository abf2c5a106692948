//! Field mapping resolver
//!
//! Resolution runs three ordered passes over the target pattern's fields.
//! Each pass only fills fields still unset after the earlier ones:
//!
//! 1. direct/common copies from a non-empty source
//! 2. compute rules, reading the source view only
//! 3. auto-generate defaults
//!
//! Rule failures never abort resolution. A failing rule leaves its field
//! unset (a later pass may still fill it), records a `MappingError`, and
//! logs a warning. Inside a compute rule, an input the transform cannot use
//! is dropped the same way before the rule runs, so one unusable value
//! never sinks the inputs that are fine.

use prism_core::{
    FieldSpec, FieldType, FieldValue, MappingError, Node, PatternDefinition, PatternFields,
};
use prism_rules::{CompiledRuleSet, ComputeInput, InputSource, Mapping, NodeAttribute, Transform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a resolved field got its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldOrigin {
    /// Direct/common copy of a non-empty source value
    Preserved,
    /// Compute result derived from at least one non-empty input
    Mapped,
    /// Auto-generated, no source dependency
    Auto,
    /// Left at its default
    Empty,
}

/// Output of one resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// A value for every field of the target pattern.
    pub fields: PatternFields,
    /// How each field got its value.
    pub origins: BTreeMap<String, FieldOrigin>,
    /// Recovered per-field failures.
    pub errors: Vec<MappingError>,
}

impl Resolution {
    /// Fields filled by a rule, in target field order.
    pub fn fields_modified(&self, target: &PatternDefinition) -> Vec<String> {
        target
            .field_ids()
            .filter(|id| {
                self.origins
                    .get(*id)
                    .map_or(false, |origin| *origin != FieldOrigin::Empty)
            })
            .map(str::to_string)
            .collect()
    }
}

/// Resolves a node's source view into a target pattern.
pub struct Resolver<'a> {
    target: &'a PatternDefinition,
    rules: Option<&'a CompiledRuleSet>,
}

impl<'a> Resolver<'a> {
    pub fn new(target: &'a PatternDefinition, rules: Option<&'a CompiledRuleSet>) -> Self {
        Self { target, rules }
    }

    /// Resolve `source` (the node's data for the from-pattern) into the
    /// target pattern. A pure function of its inputs.
    pub fn resolve(&self, node: &Node, source: &PatternFields) -> Resolution {
        let mut resolved: BTreeMap<&str, (FieldValue, FieldOrigin)> = BTreeMap::new();
        let mut errors = Vec::new();

        let Some(rules) = self.rules else {
            return self.finish(resolved, errors);
        };
        let view = SourceView { node, source };

        // Pass 1: direct/common
        for compiled in &rules.mappings {
            let Some(spec) = self.target.field(&compiled.target) else {
                continue;
            };
            let (raw, transform) = match &compiled.mapping {
                Mapping::Direct { source, transform } => (view.field(source), transform),
                Mapping::Common { key, transform } => (view.common(*key), transform),
                Mapping::Compute { .. } => continue,
            };
            if raw.is_empty() {
                continue;
            }
            match apply_optional(transform.as_ref(), raw).and_then(|v| spec.accept(&v)) {
                Ok(value) if !value.is_empty() => {
                    resolved.insert(spec.id.as_str(), (value, FieldOrigin::Preserved));
                }
                Ok(_) => {}
                Err(reason) => errors.push(self.failure(rules, spec, reason)),
            }
        }

        // Pass 2: compute, against the source view only
        for compiled in &rules.mappings {
            let Mapping::Compute { inputs, transform } = &compiled.mapping else {
                continue;
            };
            let Some(spec) = self.target.field(&compiled.target) else {
                continue;
            };
            if resolved.contains_key(spec.id.as_str()) {
                continue;
            }
            match self.compute(rules, &view, inputs, transform, spec, &mut errors) {
                Ok(Some(value)) => {
                    resolved.insert(spec.id.as_str(), (value, FieldOrigin::Mapped));
                }
                Ok(None) => {}
                Err(reason) => errors.push(self.failure(rules, spec, reason)),
            }
        }

        // Pass 3: auto-generate whatever is still unset
        for auto in &rules.auto_generate {
            let Some(spec) = self.target.field(&auto.target) else {
                continue;
            };
            if resolved.contains_key(spec.id.as_str()) {
                continue;
            }
            match spec.accept(&auto.value) {
                Ok(value) => {
                    resolved.insert(spec.id.as_str(), (value, FieldOrigin::Auto));
                }
                Err(reason) => errors.push(self.failure(rules, spec, reason)),
            }
        }

        self.finish(resolved, errors)
    }

    /// Run one compute rule. `Ok(None)` means no usable input had a value,
    /// or the result was empty; the field stays unset.
    fn compute(
        &self,
        rules: &CompiledRuleSet,
        view: &SourceView<'_>,
        inputs: &[ComputeInput],
        transform: &Transform,
        spec: &FieldSpec,
        errors: &mut Vec<MappingError>,
    ) -> Result<Option<FieldValue>, String> {
        let mut values = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.iter().enumerate() {
            let raw = view.input(&input.source);
            if raw.is_empty() {
                values.push(raw);
                continue;
            }
            let usable = apply_optional(input.transform.as_ref(), raw)
                .and_then(|value| screen_input(transform, spec, value));
            match usable {
                Ok(value) => values.push(value),
                Err(reason) => {
                    tracing::warn!(
                        from = %rules.from,
                        to = %rules.to,
                        target_field = %spec.id,
                        input = index,
                        reason = %reason,
                        "compute input ignored"
                    );
                    errors.push(MappingError {
                        target_field: spec.id.clone(),
                        reason: format!("input {} ignored: {}", index, reason),
                    });
                    values.push(FieldValue::Null);
                }
            }
        }
        if values.iter().all(FieldValue::is_empty) {
            return Ok(None);
        }

        let value = spec.accept(&transform.apply(&values)?)?;
        Ok(if value.is_empty() { None } else { Some(value) })
    }

    fn failure(&self, rules: &CompiledRuleSet, spec: &FieldSpec, reason: String) -> MappingError {
        tracing::warn!(
            from = %rules.from,
            to = %rules.to,
            target_field = %spec.id,
            reason = %reason,
            "mapping failed, field left at its empty default"
        );
        MappingError {
            target_field: spec.id.clone(),
            reason,
        }
    }

    fn finish(
        &self,
        mut resolved: BTreeMap<&str, (FieldValue, FieldOrigin)>,
        errors: Vec<MappingError>,
    ) -> Resolution {
        let failed: Vec<&str> = errors.iter().map(|e| e.target_field.as_str()).collect();
        let mut fields = PatternFields::new();
        let mut origins = BTreeMap::new();

        for spec in &self.target.fields {
            let (value, origin) = match resolved.remove(spec.id.as_str()) {
                Some(entry) => entry,
                None if failed.contains(&spec.id.as_str()) => (spec.empty_value(), FieldOrigin::Empty),
                None => (spec.initial_value(), FieldOrigin::Empty),
            };
            fields.insert(spec.id.clone(), value);
            origins.insert(spec.id.clone(), origin);
        }

        Resolution {
            fields,
            origins,
            errors,
        }
    }
}

/// Check one non-empty input against what the transform will do with it.
///
/// `sum` only adds numbers and `first_non_empty` only picks values the
/// target field accepts; anything else is left to the transform itself.
fn screen_input(transform: &Transform, spec: &FieldSpec, value: FieldValue) -> Result<FieldValue, String> {
    match transform {
        Transform::Sum => value
            .coerce(FieldType::Number)
            .ok_or_else(|| format!("sum needs a number, got {}", value.type_name())),
        Transform::FirstNonEmpty => spec.accept(&value),
        _ => Ok(value),
    }
}

fn apply_optional(transform: Option<&Transform>, value: FieldValue) -> Result<FieldValue, String> {
    match transform {
        Some(t) => t.apply(std::slice::from_ref(&value)),
        None => Ok(value),
    }
}

/// Read-only view of the node as seen from the source pattern.
struct SourceView<'a> {
    node: &'a Node,
    source: &'a PatternFields,
}

impl SourceView<'_> {
    fn field(&self, id: &str) -> FieldValue {
        self.source.get(id).cloned().unwrap_or(FieldValue::Null)
    }

    fn common(&self, key: prism_core::CommonKey) -> FieldValue {
        self.node.common_fields().get(key).clone()
    }

    fn attribute(&self, attr: NodeAttribute) -> FieldValue {
        match attr {
            NodeAttribute::Name => FieldValue::text(self.node.name.clone()),
            NodeAttribute::Description => FieldValue::text(self.node.description.clone()),
        }
    }

    fn input(&self, source: &InputSource) -> FieldValue {
        match source {
            InputSource::Source(id) => self.field(id),
            InputSource::Common(key) => self.common(*key),
            InputSource::Attribute(attr) => self.attribute(*attr),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
