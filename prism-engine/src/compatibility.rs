//! Compatibility matrix
//!
//! Reports a coarse quality tier per ordered pattern pair. The expected
//! score behind a tier comes from, in order:
//!
//! 1. the same pattern on both sides (always 100)
//! 2. the running mean of observed translation scores
//! 3. a declared design-time score
//! 4. the rule set's best-case estimate
//! 5. `unruled_pair_expected_score` when there is no rule set at all

use crate::Scorer;
use prism_core::{EngineConfig, PatternId, Tier, UnknownPatternError};
use prism_rules::Registry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type Pair = (PatternId, PatternId);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Observed {
    sum: u64,
    count: u64,
}

impl Observed {
    fn mean(&self) -> Option<u8> {
        if self.count == 0 {
            return None;
        }
        Some(((self.sum as f64) / (self.count as f64)).round().min(100.0) as u8)
    }
}

/// Per-pair expected scores and tiers. Safe to share across threads.
#[derive(Debug)]
pub struct CompatibilityMatrix {
    registry: Arc<Registry>,
    config: EngineConfig,
    declared: RwLock<HashMap<Pair, u8>>,
    observed: RwLock<HashMap<Pair, Observed>>,
}

impl CompatibilityMatrix {
    /// Create a matrix seeded from the registry's declared table.
    pub fn new(registry: Arc<Registry>, config: EngineConfig) -> Self {
        Self {
            registry,
            config,
            declared: RwLock::new(HashMap::new()),
            observed: RwLock::new(HashMap::new()),
        }
    }

    /// Declare (or replace) the expected score of a pair at runtime.
    pub fn declare(&self, from: &str, to: &str, expected: u8) -> Result<(), UnknownPatternError> {
        let pair = self.pair(from, to)?;
        if let Ok(mut declared) = self.declared.write() {
            declared.insert(pair, expected.min(100));
        }
        Ok(())
    }

    /// Record the score of a completed translation.
    pub fn observe(&self, from: &str, to: &str, score: u8) -> Result<(), UnknownPatternError> {
        let pair = self.pair(from, to)?;
        if let Ok(mut observed) = self.observed.write() {
            let entry = observed.entry(pair).or_default();
            entry.sum += u64::from(score.min(100));
            entry.count += 1;
        }
        Ok(())
    }

    /// Number of observations recorded for a pair.
    pub fn observations(&self, from: &str, to: &str) -> u64 {
        let pair = (PatternId::new(from), PatternId::new(to));
        self.observed
            .read()
            .ok()
            .and_then(|observed| observed.get(&pair).map(|o| o.count))
            .unwrap_or(0)
    }

    /// Expected preservation score for translating `from` into `to`.
    pub fn expected_score(&self, from: &str, to: &str) -> Result<u8, UnknownPatternError> {
        let pair = self.pair(from, to)?;
        if pair.0 == pair.1 {
            return Ok(100);
        }

        if let Ok(observed) = self.observed.read() {
            if let Some(mean) = observed.get(&pair).and_then(Observed::mean) {
                return Ok(mean);
            }
        }

        if let Ok(declared) = self.declared.read() {
            if let Some(expected) = declared.get(&pair) {
                return Ok(*expected);
            }
        }

        if let Some(expected) = self.registry.declared_compatibility(from, to) {
            return Ok(expected);
        }

        match (self.registry.rule_set(from, to), self.registry.pattern(to)) {
            (Some(rules), Some(target)) => {
                Ok(Scorer::new(self.config.weights).best_case(target, rules))
            }
            _ => Ok(self.config.unruled_pair_expected_score),
        }
    }

    /// Tier for a pair: HIGH, MEDIUM, or LOW.
    pub fn get_tier(&self, from: &str, to: &str) -> Result<Tier, UnknownPatternError> {
        let score = self.expected_score(from, to)?;
        Ok(self.config.tiers.tier_for(score))
    }

    fn pair(&self, from: &str, to: &str) -> Result<Pair, UnknownPatternError> {
        let from = self.registry.require_pattern(from)?.id.clone();
        let to = self.registry.require_pattern(to)?.id.clone();
        Ok((from, to))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::{CommonKey, FieldSpec, FieldType, PatternDefinition};
    use prism_rules::{AutoGenerateDef, CompatibilityDef, MappingDef, RuleSetDef};

    fn registry() -> Arc<Registry> {
        let mut builder = Registry::builder();
        builder
            .register_patterns([
                PatternDefinition::new("generic", "Generic")
                    .with_field(FieldSpec::new("cost", "Cost", FieldType::Number)),
                PatternDefinition::new("sales", "Sales")
                    .with_field(FieldSpec::new("dealValue", "Deal Value", FieldType::Number))
                    .with_field(FieldSpec::new("probability", "Probability", FieldType::Number)),
                PatternDefinition::new("film", "Film")
                    .with_field(FieldSpec::new("runtime", "Runtime", FieldType::Number)),
            ])
            .unwrap();
        builder
            .register_rule_set(RuleSetDef {
                from: PatternId::from("generic"),
                to: PatternId::from("sales"),
                mappings: vec![MappingDef::common("dealValue", CommonKey::MonetaryValue)],
                auto_generate: vec![AutoGenerateDef::value("probability", 50.0)],
            })
            .unwrap();
        builder.declare_compatibility([CompatibilityDef {
            from: PatternId::from("sales"),
            to: PatternId::from("generic"),
            expected: 88,
        }]);
        Arc::new(builder.build().unwrap())
    }

    fn matrix() -> CompatibilityMatrix {
        CompatibilityMatrix::new(registry(), EngineConfig::default())
    }

    #[test]
    fn test_same_pattern_is_high() {
        assert_eq!(matrix().get_tier("film", "film"), Ok(Tier::High));
    }

    #[test]
    fn test_declared_score() {
        let matrix = matrix();
        assert_eq!(matrix.expected_score("sales", "generic"), Ok(88));
        assert_eq!(matrix.get_tier("sales", "generic"), Ok(Tier::High));
    }

    #[test]
    fn test_rule_set_estimate() {
        // (1.0 + 0.2) / 2 = 60
        let matrix = matrix();
        assert_eq!(matrix.expected_score("generic", "sales"), Ok(60));
        assert_eq!(matrix.get_tier("generic", "sales"), Ok(Tier::Medium));
    }

    #[test]
    fn test_unruled_pair_is_low() {
        let matrix = matrix();
        assert_eq!(matrix.expected_score("film", "sales"), Ok(0));
        assert_eq!(matrix.get_tier("film", "sales"), Ok(Tier::Low));
    }

    #[test]
    fn test_observations_override_declared() {
        let matrix = matrix();
        matrix.observe("sales", "generic", 40).unwrap();
        matrix.observe("sales", "generic", 61).unwrap();
        assert_eq!(matrix.observations("sales", "generic"), 2);
        assert_eq!(matrix.expected_score("sales", "generic"), Ok(51));
        assert_eq!(matrix.get_tier("sales", "generic"), Ok(Tier::Medium));
    }

    #[test]
    fn test_runtime_declaration_overrides_registry() {
        let matrix = matrix();
        matrix.declare("film", "sales", 70).unwrap();
        assert_eq!(matrix.get_tier("film", "sales"), Ok(Tier::Medium));
    }

    #[test]
    fn test_unknown_pattern() {
        let err = matrix().get_tier("generic", "astrology").unwrap_err();
        assert_eq!(err.pattern, PatternId::from("astrology"));
    }
}
