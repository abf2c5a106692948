//! Fuzz test for rule document loading
//!
//! Feeds arbitrary text through every document format and, when it parses,
//! through registry construction. Both stages must return errors rather
//! than panic.
//!
//! Run with: cargo +nightly fuzz run document_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use prism_rules::{DocumentFormat, Registry, RuleDocument};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        for format in [DocumentFormat::Yaml, DocumentFormat::Json, DocumentFormat::Toml] {
            let Ok(doc) = RuleDocument::parse(format, input) else {
                continue;
            };

            if let Ok(registry) = Registry::from_document(&doc) {
                assert_eq!(registry.pattern_count(), doc.patterns.len());
                assert!(registry.rule_set_count() <= doc.rule_sets.len());

                // Building twice from the same input is deterministic
                let again = Registry::from_document(&doc).expect("second build must succeed");
                assert_eq!(registry.fingerprint(), again.fingerprint());
            }
        }
    }
});
