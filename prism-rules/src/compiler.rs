//! Rule-set compiler
//!
//! Turns a `RuleSetDef` into a `CompiledRuleSet` checked against the two
//! pattern definitions it connects. Everything that can be checked
//! statically is checked here, once, at registration:
//!
//! - referenced patterns, fields, and common keys exist
//! - transform arity fits the declared inputs
//! - auto-generate constants fit the target field
//! - compute rules never read another compute rule's output
//!
//! # Compute ordering
//!
//! A compute rule may reference a `target:` field only when that field is
//! filled by a direct/common mapping of the same rule set. The reference is
//! compiled down to that mapping's *source* expression, so compute rules
//! only ever observe the source view of the node. Referencing a compute
//! target (including itself) is a `CyclicComputeError`.

use crate::{AutoGenerateDef, FieldRef, MappingDef, NodeAttribute, RuleSetDef, Transform};
use prism_core::{
    CommonKey, CyclicComputeError, FieldId, FieldType, FieldValue, PatternDefinition, PatternId,
    PrismResult, SchemaError,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// COMPILED TYPES
// ============================================================================

/// Where a compiled input reads from. Always the source view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSource {
    Source(FieldId),
    Common(CommonKey),
    Attribute(NodeAttribute),
}

/// A compute input, possibly routed through a direct/common mapping's
/// transform when it was declared as a `target:` reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeInput {
    pub source: InputSource,
    pub transform: Option<Transform>,
}

/// Compiled mapping kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mapping {
    Direct {
        source: FieldId,
        transform: Option<Transform>,
    },
    Common {
        key: CommonKey,
        transform: Option<Transform>,
    },
    Compute {
        inputs: Vec<ComputeInput>,
        transform: Transform,
    },
}

impl Mapping {
    pub fn is_compute(&self) -> bool {
        matches!(self, Mapping::Compute { .. })
    }
}

/// Mapping for one target field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledMapping {
    pub target: FieldId,
    pub mapping: Mapping,
}

/// Compiled auto-generate rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledAutoGenerate {
    pub target: FieldId,
    pub value: FieldValue,
}

/// A validated, ready-to-run rule set for one ordered pattern pair.
///
/// Mappings and auto-generate rules are stored in the target pattern's
/// field order, so resolution never depends on declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledRuleSet {
    pub from: PatternId,
    pub to: PatternId,
    pub mappings: Vec<CompiledMapping>,
    pub auto_generate: Vec<CompiledAutoGenerate>,
}

impl CompiledRuleSet {
    pub fn mapping_for(&self, target: &str) -> Option<&Mapping> {
        self.mappings
            .iter()
            .find(|m| m.target == target)
            .map(|m| &m.mapping)
    }

    pub fn auto_generate_for(&self, target: &str) -> Option<&FieldValue> {
        self.auto_generate
            .iter()
            .find(|a| a.target == target)
            .map(|a| &a.value)
    }
}

// ============================================================================
// COMPILER
// ============================================================================

/// Compiles rule sets between two registered patterns.
pub struct RuleSetCompiler<'a> {
    from: &'a PatternDefinition,
    to: &'a PatternDefinition,
}

impl<'a> RuleSetCompiler<'a> {
    pub fn new(from: &'a PatternDefinition, to: &'a PatternDefinition) -> Self {
        Self { from, to }
    }

    /// Compile and validate a rule set.
    pub fn compile(&self, def: &RuleSetDef) -> PrismResult<CompiledRuleSet> {
        // Last declaration wins for duplicate targets.
        let mut declared: BTreeMap<&str, &MappingDef> = BTreeMap::new();
        for mapping in &def.mappings {
            self.require_target(&mapping.target)?;
            if mapping.compute.is_some() && (mapping.source.is_some() || mapping.common.is_some()) {
                return Err(invalid_rule(&mapping.target, ONE_KIND).into());
            }
            if declared.insert(mapping.target.as_str(), mapping).is_some() {
                tracing::debug!(
                    from = %self.from.id,
                    to = %self.to.id,
                    target = %mapping.target,
                    "duplicate mapping, last declaration wins"
                );
            }
        }

        // First pass: direct/common mappings.
        let mut copies: HashMap<&str, Mapping> = HashMap::new();
        for (target, mapping) in &declared {
            if mapping.compute.is_none() {
                copies.insert(*target, self.compile_copy(mapping)?);
            }
        }

        // Second pass: compute mappings, after the cycle check.
        self.check_compute_graph(&declared, &copies)?;
        let mut compiled: HashMap<&str, Mapping> = copies.clone();
        for (target, mapping) in &declared {
            if let Some(compute) = &mapping.compute {
                if mapping.transform.is_some() {
                    return Err(invalid_rule(target, "compute mappings take their transform inside `compute`").into());
                }
                compute
                    .transform
                    .check_arity(compute.inputs.len())
                    .map_err(|reason| invalid_rule(target, &reason))?;
                let inputs = compute
                    .inputs
                    .iter()
                    .map(|input| self.compile_input(input, &copies))
                    .collect::<PrismResult<Vec<_>>>()?;
                compiled.insert(
                    *target,
                    Mapping::Compute {
                        inputs,
                        transform: compute.transform.clone(),
                    },
                );
            }
        }

        let mut auto: HashMap<&str, FieldValue> = HashMap::new();
        for rule in &def.auto_generate {
            let value = self.compile_auto_generate(rule)?;
            auto.insert(rule.target.as_str(), value);
        }

        let mappings = self
            .to
            .field_ids()
            .filter_map(|id| {
                compiled.remove(id).map(|mapping| CompiledMapping {
                    target: id.to_string(),
                    mapping,
                })
            })
            .collect();
        let auto_generate = self
            .to
            .field_ids()
            .filter_map(|id| {
                auto.remove(id).map(|value| CompiledAutoGenerate {
                    target: id.to_string(),
                    value,
                })
            })
            .collect();

        tracing::debug!(from = %self.from.id, to = %self.to.id, "compiled rule set");

        Ok(CompiledRuleSet {
            from: self.from.id.clone(),
            to: self.to.id.clone(),
            mappings,
            auto_generate,
        })
    }

    fn require_target(&self, target: &str) -> Result<(), SchemaError> {
        if self.to.field(target).is_none() {
            return Err(undefined("target field", &self.to.id, target));
        }
        Ok(())
    }

    fn require_source(&self, source: &str) -> Result<(), SchemaError> {
        if self.from.field(source).is_none() {
            return Err(undefined("source field", &self.from.id, source));
        }
        Ok(())
    }

    fn compile_copy(&self, def: &MappingDef) -> PrismResult<Mapping> {
        if let Some(transform) = &def.transform {
            transform
                .check_arity(1)
                .map_err(|reason| invalid_rule(&def.target, &reason))?;
        }
        match (&def.source, &def.common) {
            (Some(source), None) => {
                self.require_source(source)?;
                Ok(Mapping::Direct {
                    source: source.clone(),
                    transform: def.transform.clone(),
                })
            }
            (None, Some(key)) => Ok(Mapping::Common {
                key: *key,
                transform: def.transform.clone(),
            }),
            _ => Err(invalid_rule(&def.target, ONE_KIND).into()),
        }
    }

    fn compile_input(
        &self,
        input: &FieldRef,
        copies: &HashMap<&str, Mapping>,
    ) -> PrismResult<ComputeInput> {
        match input {
            FieldRef::Source(field) => {
                self.require_source(field)?;
                Ok(ComputeInput {
                    source: InputSource::Source(field.clone()),
                    transform: None,
                })
            }
            FieldRef::Common(key) => Ok(ComputeInput {
                source: InputSource::Common(*key),
                transform: None,
            }),
            FieldRef::Attribute(attr) => Ok(ComputeInput {
                source: InputSource::Attribute(*attr),
                transform: None,
            }),
            FieldRef::Target(target) => match copies.get(target.as_str()) {
                Some(Mapping::Direct { source, transform }) => Ok(ComputeInput {
                    source: InputSource::Source(source.clone()),
                    transform: transform.clone(),
                }),
                Some(Mapping::Common { key, transform }) => Ok(ComputeInput {
                    source: InputSource::Common(*key),
                    transform: transform.clone(),
                }),
                _ => Err(undefined("mapped target field", &self.to.id, target).into()),
            },
        }
    }

    /// Reject any compute rule that reads another compute target.
    ///
    /// Walks the graph depth-first so the error names the actual chain
    /// (or cycle) rather than just the first bad edge.
    fn check_compute_graph(
        &self,
        declared: &BTreeMap<&str, &MappingDef>,
        copies: &HashMap<&str, Mapping>,
    ) -> Result<(), CyclicComputeError> {
        let edges: BTreeMap<&str, Vec<&str>> = declared
            .iter()
            .filter_map(|(target, def)| {
                def.compute.as_ref().map(|compute| {
                    let deps = compute
                        .inputs
                        .iter()
                        .filter_map(|input| match input {
                            FieldRef::Target(t) if !copies.contains_key(t.as_str()) => {
                                Some(t.as_str())
                            }
                            _ => None,
                        })
                        .filter(|t| declared.get(t).map_or(false, |d| d.compute.is_some()))
                        .collect::<Vec<_>>();
                    (*target, deps)
                })
            })
            .collect();

        for (start, deps) in &edges {
            if deps.is_empty() {
                continue;
            }
            let mut path = vec![*start];
            let chain = find_cycle(*start, &edges, &mut path).unwrap_or_else(|| {
                vec![start.to_string(), deps[0].to_string()]
            });
            return Err(CyclicComputeError {
                from: self.from.id.clone(),
                to: self.to.id.clone(),
                cycle: chain,
            });
        }
        Ok(())
    }

    fn compile_auto_generate(&self, rule: &AutoGenerateDef) -> PrismResult<FieldValue> {
        let spec = self
            .to
            .field(&rule.target)
            .ok_or_else(|| undefined("target field", &self.to.id, &rule.target))?;

        match (&rule.value, rule.first_option) {
            (Some(value), false) => spec.accept(value).map_err(|_| {
                SchemaError::TypeMismatch {
                    field: rule.target.clone(),
                    expected: spec.field_type.to_string(),
                    actual: value.type_name().to_string(),
                }
                .into()
            }),
            (None, true) => {
                if spec.field_type != FieldType::Select {
                    return Err(invalid_rule(&rule.target, "first_option needs a select field").into());
                }
                spec.options
                    .first()
                    .map(|o| FieldValue::text(o.clone()))
                    .ok_or_else(|| invalid_rule(&rule.target, "select field has no options").into())
            }
            _ => Err(invalid_rule(
                &rule.target,
                "exactly one of `value`, `first_option` must be set",
            )
            .into()),
        }
    }
}

/// DFS from `node`; returns the first cycle reachable through `path`.
fn find_cycle<'g>(
    node: &'g str,
    edges: &BTreeMap<&'g str, Vec<&'g str>>,
    path: &mut Vec<&'g str>,
) -> Option<Vec<String>> {
    for next in edges.get(node).into_iter().flatten() {
        if let Some(pos) = path.iter().position(|p| p == next) {
            let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(next.to_string());
            return Some(cycle);
        }
        path.push(*next);
        if let Some(cycle) = find_cycle(*next, edges, path) {
            return Some(cycle);
        }
        path.pop();
    }
    None
}

const ONE_KIND: &str = "exactly one of `source`, `common`, `compute` must be set";

fn undefined(kind: &str, pattern: &PatternId, name: &str) -> SchemaError {
    SchemaError::UndefinedReference {
        kind: kind.to_string(),
        name: format!("{}.{}", pattern, name),
    }
}

fn invalid_rule(field: &str, reason: &str) -> SchemaError {
    SchemaError::InvalidRule {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
