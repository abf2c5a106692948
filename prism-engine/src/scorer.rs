//! Preservation scorer
//!
//! Score = round(100 × Σweight / field_count) over the target pattern's
//! fields, where `name` and `description` are not counted. Origins are
//! tallied per kind before weighting, so the score does not depend on
//! field declaration order.

use crate::FieldOrigin;
use prism_core::{PatternDefinition, ScoreWeights, NODE_ATTRIBUTES};
use prism_rules::{CompiledRuleSet, Mapping};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    preserved: u32,
    mapped: u32,
    auto: u32,
    total: u32,
}

impl Tally {
    fn add(&mut self, origin: FieldOrigin) {
        match origin {
            FieldOrigin::Preserved => self.preserved += 1,
            FieldOrigin::Mapped => self.mapped += 1,
            FieldOrigin::Auto => self.auto += 1,
            FieldOrigin::Empty => {}
        }
        self.total += 1;
    }
}

/// Weights resolved fields into a 0-100 preservation score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Scorer {
    weights: ScoreWeights,
}

impl Scorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weight(&self, origin: FieldOrigin) -> f64 {
        match origin {
            FieldOrigin::Preserved => self.weights.preserved,
            FieldOrigin::Mapped => self.weights.mapped,
            FieldOrigin::Auto => self.weights.auto,
            FieldOrigin::Empty => 0.0,
        }
    }

    /// Score a resolution's field origins. Fields of `target` missing from
    /// `origins` count as empty. A target with nothing to count scores 0.
    pub fn score(&self, target: &PatternDefinition, origins: &BTreeMap<String, FieldOrigin>) -> u8 {
        let mut tally = Tally::default();
        for id in counted_fields(target) {
            tally.add(origins.get(id).copied().unwrap_or(FieldOrigin::Empty));
        }
        self.finish(tally)
    }

    /// Best score a rule set can reach, assuming every source is non-empty.
    ///
    /// Used as the expected score of pairs with no declared or observed
    /// entry.
    pub fn best_case(&self, target: &PatternDefinition, rules: &CompiledRuleSet) -> u8 {
        let mut tally = Tally::default();
        for id in counted_fields(target) {
            let origin = match rules.mapping_for(id) {
                Some(Mapping::Direct { .. }) | Some(Mapping::Common { .. }) => FieldOrigin::Preserved,
                Some(Mapping::Compute { .. }) => FieldOrigin::Mapped,
                None if rules.auto_generate_for(id).is_some() => FieldOrigin::Auto,
                None => FieldOrigin::Empty,
            };
            tally.add(origin);
        }
        self.finish(tally)
    }

    fn finish(&self, tally: Tally) -> u8 {
        if tally.total == 0 {
            return 0;
        }
        let sum = f64::from(tally.preserved) * self.weights.preserved
            + f64::from(tally.mapped) * self.weights.mapped
            + f64::from(tally.auto) * self.weights.auto;
        (100.0 * sum / f64::from(tally.total)).round().clamp(0.0, 100.0) as u8
    }
}

fn counted_fields(target: &PatternDefinition) -> impl Iterator<Item = &str> {
    target.field_ids().filter(|id| !NODE_ATTRIBUTES.contains(id))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::{FieldSpec, FieldType};

    fn target() -> PatternDefinition {
        PatternDefinition::new("sales", "Sales Pipeline")
            .with_field(FieldSpec::new("name", "Name", FieldType::Text))
            .with_field(FieldSpec::new("dealValue", "Deal Value", FieldType::Number))
            .with_field(FieldSpec::new("summary", "Summary", FieldType::Text))
            .with_field(FieldSpec::new("probability", "Probability", FieldType::Number))
            .with_field(FieldSpec::new("contact", "Contact", FieldType::Text))
    }

    fn origins(pairs: &[(&str, FieldOrigin)]) -> BTreeMap<String, FieldOrigin> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_weights() {
        let scorer = Scorer::default();
        let score = scorer.score(
            &target(),
            &origins(&[
                ("name", FieldOrigin::Empty),
                ("dealValue", FieldOrigin::Preserved),
                ("summary", FieldOrigin::Mapped),
                ("probability", FieldOrigin::Auto),
                ("contact", FieldOrigin::Empty),
            ]),
        );
        // (1.0 + 0.85 + 0.2 + 0) / 4 = 0.5125
        assert_eq!(score, 51);
    }

    #[test]
    fn test_identity_fields_not_counted() {
        let scorer = Scorer::default();
        let all_preserved = origins(&[
            ("dealValue", FieldOrigin::Preserved),
            ("summary", FieldOrigin::Preserved),
            ("probability", FieldOrigin::Preserved),
            ("contact", FieldOrigin::Preserved),
        ]);
        assert_eq!(scorer.score(&target(), &all_preserved), 100);
    }

    #[test]
    fn test_all_empty_scores_zero() {
        assert_eq!(Scorer::default().score(&target(), &BTreeMap::new()), 0);
        assert_eq!(
            Scorer::default().score(&PatternDefinition::new("blank", "Blank"), &BTreeMap::new()),
            0
        );
    }
}
