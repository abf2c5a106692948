//! PRISM Test Utilities
//!
//! Shared test infrastructure for the PRISM workspace:
//! - Proptest generators for values, field specs, and patterns
//! - A sample pattern catalog (generic, sales, philosophy, fitness, film)
//! - Custom assertions for PRISM error kinds
//! - Tracing initialisation for tests

// Re-export core types for convenience
pub use prism_core::{
    CommonKey, EngineConfig, FieldSpec, FieldType, FieldValue, HistoryAction, Node, NodeType,
    PatternDefinition, PatternFields, PatternId, PrismError, PrismResult, Tier,
};
pub use prism_engine::{Engine, TranslateOptions, TranslationResult};
pub use prism_rules::{Registry, RuleDocument};

use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

// ============================================================================
// TRACING
// ============================================================================

/// Install a fmt subscriber for tests, filtered by `RUST_LOG` (default
/// `warn`). Safe to call from every test.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        // Another subscriber may already be installed; that one wins.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for PRISM types.

    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    /// Generate a pattern or field identifier.
    pub fn arb_identifier() -> impl Strategy<Value = String> {
        "[a-z][a-zA-Z0-9]{0,11}"
    }

    pub fn arb_field_type() -> impl Strategy<Value = FieldType> {
        prop_oneof![
            Just(FieldType::Text),
            Just(FieldType::Textarea),
            Just(FieldType::Number),
            Just(FieldType::Date),
            Just(FieldType::Select),
            Just(FieldType::Checkbox),
        ]
    }

    pub fn arb_common_key() -> impl Strategy<Value = CommonKey> {
        prop::sample::select(CommonKey::ALL.to_vec())
    }

    pub fn arb_date() -> impl Strategy<Value = NaiveDate> {
        (2000i32..2040, 1u32..=12, 1u32..=28)
            .prop_filter_map("valid date", |(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
    }

    /// Any field value, including empty ones.
    pub fn arb_field_value() -> impl Strategy<Value = FieldValue> {
        prop_oneof![
            Just(FieldValue::Null),
            any::<bool>().prop_map(FieldValue::Bool),
            (-1.0e9f64..1.0e9).prop_map(FieldValue::Number),
            arb_date().prop_map(FieldValue::Date),
            "[A-Za-z ]{0,24}".prop_map(FieldValue::Text),
        ]
    }

    /// A non-empty value that fits `spec`.
    pub fn arb_value_for(spec: &FieldSpec) -> BoxedStrategy<FieldValue> {
        match spec.field_type {
            FieldType::Text | FieldType::Textarea => "[A-Za-z][A-Za-z ]{0,23}"
                .prop_map(FieldValue::Text)
                .boxed(),
            FieldType::Number => {
                let min = spec.min.unwrap_or(0.0).max(1.0);
                let max = spec.max.unwrap_or(1.0e7).max(min + 1.0);
                (min..max).prop_map(|n| FieldValue::Number(n.round().max(1.0))).boxed()
            }
            FieldType::Date => arb_date().prop_map(FieldValue::Date).boxed(),
            FieldType::Select => prop::sample::select(spec.options.clone())
                .prop_map(FieldValue::Text)
                .boxed(),
            FieldType::Checkbox => Just(FieldValue::Bool(true)).boxed(),
        }
    }

    /// A valid field spec with the given id.
    pub fn arb_field_spec(id: String) -> impl Strategy<Value = FieldSpec> {
        arb_field_type().prop_map(move |field_type| {
            let spec = FieldSpec::new(id.clone(), id.to_uppercase(), field_type);
            match field_type {
                FieldType::Select => spec.with_options(["One", "Two", "Three"]),
                FieldType::Number => spec.with_bounds(Some(0.0), None),
                _ => spec,
            }
        })
    }

    /// A valid pattern definition with distinct field ids.
    pub fn arb_pattern_definition() -> impl Strategy<Value = PatternDefinition> {
        (
            arb_identifier(),
            prop::collection::btree_set(arb_identifier(), 0..8),
        )
            .prop_flat_map(|(id, field_ids)| {
                let specs: Vec<_> = field_ids.into_iter().map(arb_field_spec).collect();
                (Just(id), specs)
            })
            .prop_map(|(id, specs)| {
                specs
                    .into_iter()
                    .fold(PatternDefinition::new(id.clone(), id), |def, spec| {
                        def.with_field(spec)
                    })
            })
    }

    /// Values for every field of the catalog's `generic` pattern.
    pub fn arb_generic_fields() -> impl Strategy<Value = PatternFields> {
        let def = fixtures::catalog_registry()
            .pattern("generic")
            .cloned()
            .unwrap_or_else(|| PatternDefinition::new("generic", "Generic Project"));
        let strategies: Vec<_> = def
            .fields
            .iter()
            .map(|spec| (Just(spec.id.clone()), arb_value_for(spec)))
            .collect();
        strategies.prop_map(|pairs| pairs.into_iter().collect())
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! The sample catalog and helpers built on it.

    use super::*;

    /// Sample catalog in YAML.
    pub const CATALOG_YAML: &str = include_str!("../fixtures/catalog.yaml");

    /// Parse the sample catalog.
    pub fn catalog_document() -> RuleDocument {
        RuleDocument::from_yaml(CATALOG_YAML).expect("catalog fixture should parse")
    }

    /// Registry built from the sample catalog.
    pub fn catalog_registry() -> Registry {
        Registry::from_document(&catalog_document()).expect("catalog fixture should build")
    }

    /// Engine over the sample catalog with default configuration.
    pub fn catalog_engine() -> Engine {
        init_test_tracing();
        Engine::new(Arc::new(catalog_registry()), EngineConfig::default())
            .expect("default config should be valid")
    }

    /// A `generic` node with every field filled through `set_field`.
    pub fn filled_generic_node(engine: &Engine) -> Node {
        let mut node = engine
            .create_node("Kitchen remodel", NodeType::Item, None, "generic")
            .expect("generic is registered");
        let date = chrono::NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date");
        let fields: [(&str, FieldValue); 5] = [
            ("cost", FieldValue::Number(5_000_000.0)),
            ("endDate", FieldValue::Date(date)),
            ("owner", FieldValue::text("Ana Ruiz")),
            ("notes", FieldValue::text("Open plan with island")),
            ("status", FieldValue::text("Active")),
        ];
        for (field, value) in fields {
            engine
                .set_field(&mut node, field, value)
                .expect("fixture values fit the generic pattern");
        }
        node
    }

    /// A `fitness` node with exercise data.
    pub fn filled_fitness_node(engine: &Engine) -> Node {
        let mut node = engine
            .create_node("Leg day", NodeType::Item, None, "fitness")
            .expect("fitness is registered");
        engine
            .set_field(&mut node, "exercise", "Squat")
            .expect("exercise is a text field");
        engine.set_field(&mut node, "sets", 5.0).expect("sets is a number");
        engine.set_field(&mut node, "reps", 5.0).expect("reps is a number");
        node
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for PRISM-specific validation.

    use super::*;

    /// Assert that a PrismResult is an UnknownPattern error.
    #[track_caller]
    pub fn assert_unknown_pattern<T: std::fmt::Debug>(result: &PrismResult<T>, pattern: &str) {
        match result {
            Err(PrismError::UnknownPattern(err)) => {
                assert_eq!(err.pattern.as_str(), pattern, "Wrong pattern in UnknownPattern error");
            }
            other => panic!("Expected UnknownPattern({}), got: {:?}", pattern, other),
        }
    }

    /// Assert that a PrismResult is an UnknownField error.
    #[track_caller]
    pub fn assert_unknown_field<T: std::fmt::Debug>(result: &PrismResult<T>, field: &str) {
        match result {
            Err(PrismError::UnknownField(err)) => {
                assert_eq!(err.field, field, "Wrong field in UnknownField error");
            }
            other => panic!("Expected UnknownField({}), got: {:?}", field, other),
        }
    }

    /// Assert that a PrismResult is a Schema error.
    #[track_caller]
    pub fn assert_schema_error<T: std::fmt::Debug>(result: &PrismResult<T>) {
        match result {
            Err(PrismError::Schema(_)) => {}
            other => panic!("Expected Schema error, got: {:?}", other),
        }
    }

    /// Assert that a PrismResult is a CyclicCompute error.
    #[track_caller]
    pub fn assert_cyclic_compute<T: std::fmt::Debug>(result: &PrismResult<T>) {
        match result {
            Err(PrismError::CyclicCompute(_)) => {}
            other => panic!("Expected CyclicCompute error, got: {:?}", other),
        }
    }

    /// Share of `original`'s non-empty fields that `other` holds unchanged.
    pub fn preserved_ratio(original: &PatternFields, other: &PatternFields) -> f64 {
        let non_empty: Vec<_> = original.iter().filter(|(_, v)| !v.is_empty()).collect();
        if non_empty.is_empty() {
            return 1.0;
        }
        let kept = non_empty
            .iter()
            .filter(|(k, v)| other.get(k.as_str()) == Some(*v))
            .count();
        kept as f64 / non_empty.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_builds() {
        let registry = fixtures::catalog_registry();
        let ids: Vec<_> = registry.list_patterns().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["generic", "sales", "philosophy", "fitness", "film"]);
        assert_eq!(registry.rule_set_count(), 5);
        assert!(registry.rule_set("fitness", "philosophy").is_none());
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_test_tracing();
        init_test_tracing();
    }
}
