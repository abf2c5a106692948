//! Schema registry
//!
//! `RegistryBuilder` collects pattern definitions, bridges, rule sets, and
//! the static compatibility/hint tables; `build()` validates everything,
//! compiles every rule set once, and returns an immutable `Registry`.
//! Share the registry behind an `Arc`; nothing in it changes after build.

use crate::{
    BridgeDef, CompatibilityDef, CompiledRuleSet, HintDef, RuleDocument, RuleSetCompiler,
    RuleSetDef,
};
use prism_core::{
    compute_content_hash, CommonKey, ContentHash, FieldId, FieldSpec, PatternDefinition,
    PatternId, PrismResult, SchemaError, UnknownPatternError,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Two-level table keyed by an ordered pattern pair, looked up by `&str`.
type PairTable<V> = HashMap<PatternId, HashMap<PatternId, V>>;

fn pair_get<'t, V>(table: &'t PairTable<V>, from: &str, to: &str) -> Option<&'t V> {
    table.get(from).and_then(|inner| inner.get(to))
}

fn pair_entry<'t, V: Default>(table: &'t mut PairTable<V>, from: &PatternId, to: &PatternId) -> &'t mut V {
    table
        .entry(from.clone())
        .or_default()
        .entry(to.clone())
        .or_default()
}

// ============================================================================
// BUILDER
// ============================================================================

/// Collects registry input. Pattern batches are validated on registration;
/// cross references are resolved in `build()`.
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    patterns: Vec<PatternDefinition>,
    bridges: Vec<BridgeDef>,
    rule_sets: Vec<RuleSetDef>,
    compatibility: Vec<CompatibilityDef>,
    hints: Vec<HintDef>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a batch of pattern definitions.
    ///
    /// The batch is all-or-nothing: if any definition is malformed or
    /// duplicates an id (within the batch or already registered), nothing
    /// from it is kept.
    pub fn register_patterns<I>(&mut self, defs: I) -> PrismResult<&mut Self>
    where
        I: IntoIterator<Item = PatternDefinition>,
    {
        let batch: Vec<PatternDefinition> = defs.into_iter().collect();
        let mut seen: HashSet<&str> = self.patterns.iter().map(|p| p.id.as_str()).collect();

        for def in &batch {
            def.validate()?;
            if !seen.insert(def.id.as_str()) {
                return Err(SchemaError::DuplicatePattern {
                    pattern: def.id.clone(),
                }
                .into());
            }
        }

        self.patterns.extend(batch);
        Ok(self)
    }

    /// Register `CommonFieldMapper` bridges. A later bridge for the same
    /// `(pattern, field)` replaces an earlier one.
    pub fn register_bridges<I>(&mut self, bridges: I) -> &mut Self
    where
        I: IntoIterator<Item = BridgeDef>,
    {
        self.bridges.extend(bridges);
        self
    }

    /// Register the rule set for one ordered pattern pair.
    pub fn register_rule_set(&mut self, def: RuleSetDef) -> PrismResult<&mut Self> {
        if self
            .rule_sets
            .iter()
            .any(|existing| existing.from == def.from && existing.to == def.to)
        {
            return Err(SchemaError::DuplicateRuleSet {
                from: def.from,
                to: def.to,
            }
            .into());
        }
        self.rule_sets.push(def);
        Ok(self)
    }

    /// Declare design-time expected preservation scores.
    pub fn declare_compatibility<I>(&mut self, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = CompatibilityDef>,
    {
        self.compatibility.extend(entries);
        self
    }

    /// Declare adaptation hints. Hints for the same pair accumulate.
    pub fn declare_hints<I>(&mut self, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = HintDef>,
    {
        self.hints.extend(entries);
        self
    }

    /// Validate cross references, compile rule sets, and freeze.
    pub fn build(&self) -> PrismResult<Registry> {
        let index: HashMap<PatternId, usize> = self
            .patterns
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
        let lookup = |id: &PatternId| {
            index
                .get(id.as_str())
                .map(|&i| &self.patterns[i])
                .ok_or_else(|| SchemaError::UndefinedReference {
                    kind: "pattern".to_string(),
                    name: id.to_string(),
                })
        };

        let mut bridges: HashMap<PatternId, HashMap<FieldId, CommonKey>> = HashMap::new();
        for bridge in &self.bridges {
            let pattern = lookup(&bridge.pattern)?;
            if pattern.field(&bridge.field).is_none() {
                return Err(SchemaError::UndefinedReference {
                    kind: "bridge field".to_string(),
                    name: format!("{}.{}", bridge.pattern, bridge.field),
                }
                .into());
            }
            let previous = bridges
                .entry(bridge.pattern.clone())
                .or_default()
                .insert(bridge.field.clone(), bridge.common);
            if previous.is_some() {
                tracing::debug!(
                    pattern = %bridge.pattern,
                    field = %bridge.field,
                    common = %bridge.common.as_str(),
                    "bridge redeclared, last declaration wins"
                );
            }
        }

        let mut rule_sets: PairTable<Arc<CompiledRuleSet>> = HashMap::new();
        for def in &self.rule_sets {
            let from = lookup(&def.from)?;
            let to = lookup(&def.to)?;
            let compiled = RuleSetCompiler::new(from, to).compile(def)?;
            rule_sets
                .entry(def.from.clone())
                .or_default()
                .insert(def.to.clone(), Arc::new(compiled));
        }

        let mut compatibility: PairTable<u8> = HashMap::new();
        for entry in &self.compatibility {
            lookup(&entry.from)?;
            lookup(&entry.to)?;
            if entry.expected > 100 {
                return Err(SchemaError::Malformed {
                    reason: format!(
                        "expected score {} for {} -> {} exceeds 100",
                        entry.expected, entry.from, entry.to
                    ),
                }
                .into());
            }
            *pair_entry(&mut compatibility, &entry.from, &entry.to) = entry.expected;
        }

        let mut hints: PairTable<Vec<String>> = HashMap::new();
        for entry in &self.hints {
            lookup(&entry.from)?;
            lookup(&entry.to)?;
            pair_entry(&mut hints, &entry.from, &entry.to).extend(entry.hints.iter().cloned());
        }

        let fingerprint = self.fingerprint()?;
        let registry = Registry {
            patterns: self.patterns.clone(),
            index,
            bridges,
            rule_sets,
            compatibility,
            hints,
            fingerprint,
        };

        tracing::info!(
            patterns = registry.pattern_count(),
            rule_sets = registry.rule_set_count(),
            fingerprint = %registry.fingerprint_hex(),
            "registry built"
        );

        Ok(registry)
    }

    /// Hash of the canonical JSON form of the input.
    ///
    /// Patterns keep registration order (it is observable through
    /// `list_patterns`); the other tables are sorted by key with a stable
    /// sort so that last-wins duplicates keep their relative order.
    fn fingerprint(&self) -> Result<ContentHash, SchemaError> {
        let mut doc = RuleDocument {
            patterns: self.patterns.clone(),
            bridges: self.bridges.clone(),
            rule_sets: self.rule_sets.clone(),
            compatibility: self.compatibility.clone(),
            hints: self.hints.clone(),
        };
        doc.bridges
            .sort_by(|a, b| (&a.pattern, &a.field).cmp(&(&b.pattern, &b.field)));
        doc.rule_sets.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
        doc.compatibility
            .sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
        doc.hints.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));

        let bytes = serde_json::to_vec(&doc).map_err(|e| SchemaError::Malformed {
            reason: e.to_string(),
        })?;
        Ok(compute_content_hash(&bytes))
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Immutable, validated pattern registry with memoised rule sets.
#[derive(Debug, Clone)]
pub struct Registry {
    patterns: Vec<PatternDefinition>,
    index: HashMap<PatternId, usize>,
    bridges: HashMap<PatternId, HashMap<FieldId, CommonKey>>,
    rule_sets: PairTable<Arc<CompiledRuleSet>>,
    compatibility: PairTable<u8>,
    hints: PairTable<Vec<String>>,
    fingerprint: ContentHash,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Build a registry from a parsed rule document.
    pub fn from_document(doc: &RuleDocument) -> PrismResult<Self> {
        let mut builder = RegistryBuilder::new();
        builder.register_patterns(doc.patterns.iter().cloned())?;
        builder.register_bridges(doc.bridges.iter().cloned());
        for rule_set in &doc.rule_sets {
            builder.register_rule_set(rule_set.clone())?;
        }
        builder
            .declare_compatibility(doc.compatibility.iter().cloned())
            .declare_hints(doc.hints.iter().cloned());
        builder.build()
    }

    pub fn pattern(&self, id: &str) -> Option<&PatternDefinition> {
        self.index.get(id).map(|&i| &self.patterns[i])
    }

    pub fn require_pattern(&self, id: &str) -> Result<&PatternDefinition, UnknownPatternError> {
        self.pattern(id).ok_or_else(|| UnknownPatternError {
            pattern: PatternId::new(id),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get_field_spec(&self, pattern: &str, field: &str) -> Option<&FieldSpec> {
        self.pattern(pattern).and_then(|p| p.field(field))
    }

    /// Registered patterns in registration order.
    pub fn list_patterns(&self) -> impl Iterator<Item = &PatternDefinition> + Clone {
        self.patterns.iter()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn rule_set_count(&self) -> usize {
        self.rule_sets.values().map(HashMap::len).sum()
    }

    /// Common key bridged from `(pattern, field)`, if any.
    pub fn bridge_for(&self, pattern: &str, field: &str) -> Option<CommonKey> {
        self.bridges
            .get(pattern)
            .and_then(|fields| fields.get(field))
            .copied()
    }

    /// Fields of `pattern` bridged to common keys, in field order.
    pub fn bridges_of<'a>(&'a self, pattern: &'a str) -> impl Iterator<Item = (&'a FieldId, CommonKey)> + 'a {
        self.pattern(pattern)
            .into_iter()
            .flat_map(|p| p.fields.iter())
            .filter_map(move |f| self.bridge_for(pattern, &f.id).map(|key| (&f.id, key)))
    }

    pub fn rule_set(&self, from: &str, to: &str) -> Option<&Arc<CompiledRuleSet>> {
        pair_get(&self.rule_sets, from, to)
    }

    pub fn declared_compatibility(&self, from: &str, to: &str) -> Option<u8> {
        pair_get(&self.compatibility, from, to).copied()
    }

    /// Adaptation hints for a pair; empty when none were declared.
    pub fn hints_for(&self, from: &str, to: &str) -> &[String] {
        pair_get(&self.hints, from, to)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn fingerprint(&self) -> &ContentHash {
        &self.fingerprint
    }

    pub fn fingerprint_hex(&self) -> String {
        hex::encode(self.fingerprint)
    }
}

// ============================================================================
// TESTS
// ============================================================================
