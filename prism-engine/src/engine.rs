//! Translation executor and record-model operations
//!
//! `Engine` is the library's API surface. It holds the immutable registry,
//! the scoring configuration, and the compatibility matrix; it never owns
//! nodes. Callers pass nodes in by reference and serialise access to any
//! single node themselves.

use crate::{CompatibilityMatrix, Resolution, Resolver, Scorer};
use prism_core::{
    EngineConfig, FieldId, FieldValue, FieldValueError, HistoryEntry, MissingPatternDataError,
    Node, NodeId, NodeType, PatternFields, PatternId, PrismResult, Tier, UnknownFieldError,
};
use prism_rules::Registry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Options for `Engine::translate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateOptions {
    /// Re-run resolution even when the node already has data for the
    /// target pattern.
    pub force: bool,
}

impl TranslateOptions {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// Outcome of a translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub fields: PatternFields,
    pub score: u8,
    pub fields_modified: Vec<FieldId>,
    pub tier: Tier,
}

/// Whether `translate` did any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Translated,
    Cached,
}

/// The pattern translation engine.
#[derive(Debug)]
pub struct Engine {
    registry: Arc<Registry>,
    config: EngineConfig,
    matrix: CompatibilityMatrix,
}

impl Engine {
    /// Create an engine. Fails if the configuration is invalid.
    pub fn new(registry: Arc<Registry>, config: EngineConfig) -> PrismResult<Self> {
        config.validate()?;
        let matrix = CompatibilityMatrix::new(Arc::clone(&registry), config.clone());
        Ok(Self {
            registry,
            config,
            matrix,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn matrix(&self) -> &CompatibilityMatrix {
        &self.matrix
    }

    // ------------------------------------------------------------------------
    // Universal record model
    // ------------------------------------------------------------------------

    /// Create a node under a registered pattern.
    pub fn create_node(
        &self,
        name: impl Into<String>,
        node_type: NodeType,
        parent_id: Option<NodeId>,
        pattern: &str,
    ) -> PrismResult<Node> {
        let def = self.registry.require_pattern(pattern)?;
        Ok(Node::new(name, node_type, parent_id, def))
    }

    /// Read a field through the node's current view, falling back to the
    /// common bridge and then to `name`/`description`.
    pub fn get_field(&self, node: &Node, field_id: &str) -> FieldValue {
        node.get_field(field_id)
    }

    /// Write a field of the node's current view.
    ///
    /// The field must be declared by the current pattern and the value must
    /// fit its spec (a required field cannot be cleared); otherwise the node
    /// is left unchanged. Bridged fields also update their common key.
    pub fn set_field(
        &self,
        node: &mut Node,
        field_id: &str,
        value: impl Into<FieldValue>,
    ) -> PrismResult<()> {
        let pattern = node.current_view_pattern();
        let spec = self
            .registry
            .get_field_spec(pattern.as_str(), field_id)
            .ok_or_else(|| UnknownFieldError {
                pattern: pattern.clone(),
                field: field_id.to_string(),
            })?;
        let value = spec.accept_edit(&value.into()).map_err(|reason| FieldValueError {
            pattern: pattern.clone(),
            field: field_id.to_string(),
            reason,
        })?;
        let bridge = self.registry.bridge_for(pattern.as_str(), field_id);

        node.record_edit(field_id, value, bridge)?;
        Ok(())
    }

    /// Move the node's view to `pattern`.
    ///
    /// When the node already holds data for `pattern` this only switches
    /// the view and returns `None`. Otherwise the node is translated from
    /// its current view first.
    pub fn switch_view(&self, node: &mut Node, pattern: &str) -> PrismResult<Option<TranslationResult>> {
        let target = self.registry.require_pattern(pattern)?.id.clone();
        if node.has_pattern_data(&target) {
            node.switch_view(&target)?;
            return Ok(None);
        }
        let from = node.current_view_pattern().clone();
        self.translate(node, from.as_str(), pattern, TranslateOptions::default())
            .map(Some)
    }

    /// History entries in order, optionally for one pattern only.
    pub fn query_history<'a>(
        &self,
        node: &'a Node,
        pattern: Option<&'a PatternId>,
    ) -> impl Iterator<Item = &'a HistoryEntry> + Clone + 'a {
        node.history().query(pattern)
    }

    // ------------------------------------------------------------------------
    // Translation
    // ------------------------------------------------------------------------

    /// Translate `node` from `from` into `to`.
    ///
    /// `from` must be a pattern the node already holds data for; otherwise
    /// the call fails and the node is left unchanged. With existing data for `to` and `force == false` this is a no-op that
    /// returns the stored fields with the score of the translation that
    /// produced them. Data of the node's original pattern is never
    /// rewritten; forcing a translation into it only moves the view.
    pub fn translate(
        &self,
        node: &mut Node,
        from: &str,
        to: &str,
        opts: TranslateOptions,
    ) -> PrismResult<TranslationResult> {
        self.translate_inner(node, from, to, opts)
            .map(|(result, _)| result)
    }

    pub(crate) fn translate_inner(
        &self,
        node: &mut Node,
        from: &str,
        to: &str,
        opts: TranslateOptions,
    ) -> PrismResult<(TranslationResult, Outcome)> {
        let source_def = self.registry.require_pattern(from)?;
        let target_def = self.registry.require_pattern(to)?;
        let target = &target_def.id;
        source_fields(node, &source_def.id)?;

        let into_original = node.original_pattern() == target;
        if node.has_pattern_data(target) && (!opts.force || into_original) {
            if opts.force {
                node.switch_view(target)?;
            }
            tracing::debug!(node = %node.id, from, to, "translation served from stored data");
            return Ok((self.stored_result(node, target), Outcome::Cached));
        }

        let source = source_fields(node, &source_def.id)?;
        let resolution = self.resolve_with(node, source, from, to)?;

        let score = Scorer::new(self.config.weights).score(target_def, &resolution.origins);
        let fields_modified = resolution.fields_modified(target_def);
        let fields = resolution.fields;

        node.store_translation(target, fields.clone(), fields_modified.clone(), score)?;
        self.matrix.observe(from, to, score)?;

        Ok((
            TranslationResult {
                fields,
                score,
                fields_modified,
                tier: self.config.tiers.tier_for(score),
            },
            Outcome::Translated,
        ))
    }

    /// Run the resolver without touching the node.
    pub fn resolve(&self, node: &Node, from: &str, to: &str) -> PrismResult<Resolution> {
        let source_def = self.registry.require_pattern(from)?;
        let source = source_fields(node, &source_def.id)?;
        self.resolve_with(node, source, from, to)
    }

    fn resolve_with(
        &self,
        node: &Node,
        source: &PatternFields,
        from: &str,
        to: &str,
    ) -> PrismResult<Resolution> {
        let target_def = self.registry.require_pattern(to)?;
        let rules = self.registry.rule_set(from, to).map(Arc::as_ref);
        Ok(Resolver::new(target_def, rules).resolve(node, source))
    }

    /// Result for data already stored on the node.
    fn stored_result(&self, node: &Node, pattern: &PatternId) -> TranslationResult {
        let fields = node.pattern_data(pattern).cloned().unwrap_or_default();
        let (score, fields_modified) = match node.history().latest_translation(pattern) {
            Some(entry) => (
                entry.preservation_score.unwrap_or(100),
                entry.fields_modified.clone(),
            ),
            None => (100, Vec::new()),
        };
        TranslationResult {
            fields,
            score,
            fields_modified,
            tier: self.config.tiers.tier_for(score),
        }
    }

    // ------------------------------------------------------------------------
    // Compatibility
    // ------------------------------------------------------------------------

    /// Quality tier for translating `from` into `to`.
    pub fn get_tier(&self, from: &str, to: &str) -> PrismResult<Tier> {
        Ok(self.matrix.get_tier(from, to)?)
    }
}

/// The node's data for the pattern a translation reads from.
fn source_fields<'a>(
    node: &'a Node,
    pattern: &PatternId,
) -> Result<&'a PatternFields, MissingPatternDataError> {
    node.pattern_data(pattern).ok_or_else(|| MissingPatternDataError {
        node: node.id,
        pattern: pattern.clone(),
    })
}

// ============================================================================
// TESTS
// ============================================================================
