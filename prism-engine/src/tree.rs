//! Parallel tree translation
//!
//! Nodes share nothing mutable beyond the read-only registry, so a subtree
//! is translated with `rayon`: each node, then its children in parallel.
//! Every node is translated from its own current view. Cancellation stops
//! scheduling; nodes already translated keep their state.

use crate::engine::Outcome;
use crate::{Engine, TranslateOptions};
use prism_core::{Node, NodeId, PrismError, PrismResult};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Cooperative cancellation flag shared between a caller and a running
/// tree translation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Summary of a tree translation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeReport {
    /// Nodes resolved and written.
    pub translated: usize,
    /// Nodes that already had data for the target pattern.
    pub cached: usize,
    /// Nodes never scheduled because of cancellation.
    pub skipped: usize,
    /// Nodes whose translation failed, with the error.
    pub failed: Vec<(NodeId, PrismError)>,
}

impl TreeReport {
    pub fn total(&self) -> usize {
        self.translated + self.cached + self.skipped + self.failed.len()
    }
}

#[derive(Default)]
struct Counters {
    translated: AtomicUsize,
    cached: AtomicUsize,
    skipped: AtomicUsize,
    failed: Mutex<Vec<(NodeId, PrismError)>>,
}

impl Engine {
    /// Translate `root` and all its descendants into `to`.
    pub fn translate_tree(
        &self,
        root: &mut Node,
        to: &str,
        opts: TranslateOptions,
        cancel: &CancellationToken,
    ) -> PrismResult<TreeReport> {
        self.registry().require_pattern(to)?;

        let counters = Counters::default();
        self.translate_subtree(root, to, opts, cancel, &counters);

        let report = TreeReport {
            translated: counters.translated.into_inner(),
            cached: counters.cached.into_inner(),
            skipped: counters.skipped.into_inner(),
            failed: counters.failed.into_inner().unwrap_or_default(),
        };

        tracing::info!(
            root = %root.id,
            to,
            translated = report.translated,
            cached = report.cached,
            skipped = report.skipped,
            failed = report.failed.len(),
            cancelled = cancel.is_cancelled(),
            "tree translation finished"
        );

        Ok(report)
    }

    fn translate_subtree(
        &self,
        node: &mut Node,
        to: &str,
        opts: TranslateOptions,
        cancel: &CancellationToken,
        counters: &Counters,
    ) {
        if cancel.is_cancelled() {
            counters.skipped.fetch_add(node.subtree_len(), Ordering::Relaxed);
            return;
        }

        let from = node.current_view_pattern().clone();
        match self.translate_inner(node, from.as_str(), to, opts) {
            Ok((_, Outcome::Translated)) => {
                counters.translated.fetch_add(1, Ordering::Relaxed);
            }
            Ok((_, Outcome::Cached)) => {
                counters.cached.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                tracing::warn!(node = %node.id, error = %err, "node translation failed");
                if let Ok(mut failed) = counters.failed.lock() {
                    failed.push((node.id, err));
                }
            }
        }

        node.children
            .par_iter_mut()
            .for_each(|child| self.translate_subtree(child, to, opts, cancel, counters));
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::{EngineConfig, FieldSpec, FieldType, NodeType, PatternDefinition, PatternId};
    use prism_rules::{MappingDef, Registry, RuleSetDef};

    fn engine() -> Engine {
        let mut builder = Registry::builder();
        builder
            .register_patterns([
                PatternDefinition::new("generic", "Generic")
                    .with_field(FieldSpec::new("owner", "Owner", FieldType::Text)),
                PatternDefinition::new("sales", "Sales")
                    .with_field(FieldSpec::new("contact", "Contact", FieldType::Text)),
            ])
            .unwrap();
        builder
            .register_rule_set(RuleSetDef {
                from: PatternId::from("generic"),
                to: PatternId::from("sales"),
                mappings: vec![MappingDef::direct("contact", "owner")],
                auto_generate: vec![],
            })
            .unwrap();
        Engine::new(Arc::new(builder.build().unwrap()), EngineConfig::default()).unwrap()
    }

    fn tree(engine: &Engine, width: usize) -> Node {
        let mut root = engine
            .create_node("Project", NodeType::Root, None, "generic")
            .unwrap();
        for i in 0..width {
            let mut phase = engine
                .create_node(format!("Phase {}", i), NodeType::Phase, None, "generic")
                .unwrap();
            for j in 0..width {
                let mut item = engine
                    .create_node(format!("Item {}.{}", i, j), NodeType::Item, None, "generic")
                    .unwrap();
                engine.set_field(&mut item, "owner", "Ana").unwrap();
                phase.add_child(item);
            }
            root.add_child(phase);
        }
        root
    }

    #[test]
    fn test_translates_every_node() {
        let engine = engine();
        let mut root = tree(&engine, 3);
        let report = engine
            .translate_tree(&mut root, "sales", TranslateOptions::default(), &CancellationToken::new())
            .unwrap();

        assert_eq!(report.translated, 13);
        assert_eq!(report.total(), root.subtree_len());
        assert!(report.failed.is_empty());
        assert!(root.children.iter().all(|c| c.current_view_pattern().as_str() == "sales"));
        assert_eq!(
            root.children[0].children[0].get_field("contact").to_string(),
            "Ana"
        );
    }

    #[test]
    fn test_second_run_is_cached() {
        let engine = engine();
        let mut root = tree(&engine, 2);
        let cancel = CancellationToken::new();
        engine
            .translate_tree(&mut root, "sales", TranslateOptions::default(), &cancel)
            .unwrap();
        let report = engine
            .translate_tree(&mut root, "sales", TranslateOptions::default(), &cancel)
            .unwrap();
        assert_eq!(report.translated, 0);
        assert_eq!(report.cached, root.subtree_len());
    }

    #[test]
    fn test_cancelled_before_start_skips_all() {
        let engine = engine();
        let mut root = tree(&engine, 2);
        let before = root.clone();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = engine
            .translate_tree(&mut root, "sales", TranslateOptions::default(), &cancel)
            .unwrap();
        assert_eq!(report.skipped, root.subtree_len());
        assert_eq!(root, before);
    }

    #[test]
    fn test_unknown_target_pattern() {
        let engine = engine();
        let mut root = tree(&engine, 1);
        assert!(engine
            .translate_tree(&mut root, "astrology", TranslateOptions::default(), &CancellationToken::new())
            .is_err());
    }
}
