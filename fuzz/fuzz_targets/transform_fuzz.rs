//! Fuzz test for value transforms
//!
//! Decodes `{"transform": ..., "inputs": [...]}` from arbitrary bytes and
//! applies it. A transform that passes its arity check must return a value
//! or an error, never panic.
//!
//! Run with: cargo +nightly fuzz run transform_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use prism_core::FieldValue;
use prism_rules::Transform;
use serde::Deserialize;

#[derive(Deserialize)]
struct Case {
    transform: Transform,
    #[serde(default)]
    inputs: Vec<FieldValue>,
}

fuzz_target!(|data: &[u8]| {
    let Ok(case) = serde_json::from_slice::<Case>(data) else {
        return;
    };
    if case.transform.check_arity(case.inputs.len()).is_err() {
        return;
    }
    let _ = case.transform.apply(&case.inputs);
});
