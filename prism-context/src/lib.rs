//! PRISM Context - Context Export
//!
//! Hands an external prompt builder the structured facts about a node in a
//! given pattern: whether it was translated, how well, what it looked like
//! originally, what it looks like now, and how to adapt between the two.
//! Rendering prompts and calling models is the caller's job.

use prism_core::{Node, PatternFields, PatternId, PrismResult, Tier};
use prism_engine::Engine;
use serde::{Deserialize, Serialize};

/// Hint used for pairs with no declared adaptation hints.
pub const GENERIC_HINT: &str =
    "Preserve the original context: keep the intent of the original pattern's fields even where the target pattern names them differently.";

// ============================================================================
// CONTEXT BLOCKS
// ============================================================================

/// One block of exported context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextBlock {
    /// The node was created under another pattern.
    TranslationNotice {
        original_pattern: PatternId,
        current_tier: Tier,
        latest_preservation_score: Option<u8>,
    },
    /// Field data of the original pattern.
    OriginalPatternSnapshot {
        pattern: PatternId,
        fields: PatternFields,
    },
    /// Field data of the requested pattern.
    CurrentPatternFields {
        pattern: PatternId,
        fields: PatternFields,
    },
    /// Guidance for adapting content between two patterns.
    AdaptationHints {
        from_pattern: PatternId,
        to_pattern: PatternId,
        hints: Vec<String>,
    },
}

impl ContextBlock {
    pub fn kind(&self) -> &'static str {
        match self {
            ContextBlock::TranslationNotice { .. } => "translation_notice",
            ContextBlock::OriginalPatternSnapshot { .. } => "original_pattern_snapshot",
            ContextBlock::CurrentPatternFields { .. } => "current_pattern_fields",
            ContextBlock::AdaptationHints { .. } => "adaptation_hints",
        }
    }

    /// Rough token cost of the block's JSON form, for budgeting.
    pub fn estimated_tokens(&self) -> i32 {
        serde_json::to_string(self)
            .map(|json| estimate_tokens(&json))
            .unwrap_or(0)
    }
}

/// Estimate token count for text.
/// Rough estimate: ~0.75 tokens per character.
pub fn estimate_tokens(text: &str) -> i32 {
    if text.is_empty() {
        return 0;
    }
    (text.len() as f32 * 0.75).ceil() as i32
}

/// Sum of `estimated_tokens` over a block list.
pub fn total_tokens(blocks: &[ContextBlock]) -> i32 {
    blocks.iter().map(ContextBlock::estimated_tokens).sum()
}

// ============================================================================
// EXPORT
// ============================================================================

/// Build the context blocks for `node` viewed in `target`.
///
/// For a node whose original pattern is `target`, only the current fields
/// are returned. Otherwise the blocks are, in order: translation notice,
/// original snapshot, current fields, adaptation hints. If the node has no
/// data for `target` yet, the current fields block is empty.
pub fn build_context(engine: &Engine, node: &Node, target: &str) -> PrismResult<Vec<ContextBlock>> {
    let target_id = engine.registry().require_pattern(target)?.id.clone();
    let current = ContextBlock::CurrentPatternFields {
        fields: node.pattern_data(&target_id).cloned().unwrap_or_default(),
        pattern: target_id.clone(),
    };

    let original = node.original_pattern().clone();
    if original == target_id {
        return Ok(vec![current]);
    }

    let tier = engine.get_tier(original.as_str(), target)?;
    let declared = engine.registry().hints_for(original.as_str(), target);
    let hints = if declared.is_empty() {
        vec![GENERIC_HINT.to_string()]
    } else {
        declared.to_vec()
    };

    let blocks = vec![
        ContextBlock::TranslationNotice {
            original_pattern: original.clone(),
            current_tier: tier,
            latest_preservation_score: node.history().latest_score(&target_id),
        },
        ContextBlock::OriginalPatternSnapshot {
            fields: node.pattern_data(&original).cloned().unwrap_or_default(),
            pattern: original.clone(),
        },
        current,
        ContextBlock::AdaptationHints {
            from_pattern: original,
            to_pattern: target_id,
            hints,
        },
    ];

    tracing::debug!(
        node = %node.id,
        target,
        tokens = total_tokens(&blocks),
        "built translated context"
    );

    Ok(blocks)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::FieldValue;
    use prism_engine::TranslateOptions;
    use prism_test_utils::assertions::assert_unknown_pattern;
    use prism_test_utils::fixtures::{catalog_engine, filled_generic_node};

    #[test]
    fn test_untranslated_node_gets_current_fields_only() {
        let engine = catalog_engine();
        let node = filled_generic_node(&engine);
        let blocks = build_context(&engine, &node, "generic").unwrap();

        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            ContextBlock::CurrentPatternFields { pattern, fields } => {
                assert_eq!(pattern.as_str(), "generic");
                assert_eq!(fields["owner"], FieldValue::text("Ana Ruiz"));
            }
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn test_translated_node_block_order() {
        let engine = catalog_engine();
        let mut node = filled_generic_node(&engine);
        engine
            .translate(&mut node, "generic", "sales", TranslateOptions::default())
            .unwrap();

        let blocks = build_context(&engine, &node, "sales").unwrap();
        let kinds: Vec<_> = blocks.iter().map(ContextBlock::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "translation_notice",
                "original_pattern_snapshot",
                "current_pattern_fields",
                "adaptation_hints"
            ]
        );

        match &blocks[0] {
            ContextBlock::TranslationNotice {
                original_pattern,
                current_tier,
                latest_preservation_score,
            } => {
                assert_eq!(original_pattern.as_str(), "generic");
                assert_eq!(*current_tier, Tier::High);
                assert_eq!(*latest_preservation_score, Some(97));
            }
            other => panic!("unexpected block {:?}", other),
        }
        match &blocks[3] {
            ContextBlock::AdaptationHints { hints, .. } => assert_eq!(hints.len(), 2),
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn test_undeclared_pair_gets_generic_hint() {
        let engine = catalog_engine();
        let mut node = filled_generic_node(&engine);
        engine
            .translate(&mut node, "generic", "philosophy", TranslateOptions::default())
            .unwrap();

        let blocks = build_context(&engine, &node, "philosophy").unwrap();
        assert_eq!(
            blocks.last(),
            Some(&ContextBlock::AdaptationHints {
                from_pattern: PatternId::from("generic"),
                to_pattern: PatternId::from("philosophy"),
                hints: vec![GENERIC_HINT.to_string()],
            })
        );
    }

    #[test]
    fn test_not_yet_translated_target_has_empty_current_block() {
        let engine = catalog_engine();
        let node = filled_generic_node(&engine);
        let blocks = build_context(&engine, &node, "film").unwrap();

        assert_eq!(blocks.len(), 4);
        assert_eq!(
            blocks[2],
            ContextBlock::CurrentPatternFields {
                pattern: PatternId::from("film"),
                fields: PatternFields::new(),
            }
        );
        match &blocks[0] {
            ContextBlock::TranslationNotice {
                latest_preservation_score,
                ..
            } => assert_eq!(*latest_preservation_score, None),
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn test_unknown_target() {
        let engine = catalog_engine();
        let node = filled_generic_node(&engine);
        assert_unknown_pattern(&build_context(&engine, &node, "astrology"), "astrology");
    }

    #[test]
    fn test_blocks_serialise_with_kind_tag() {
        let engine = catalog_engine();
        let node = filled_generic_node(&engine);
        let blocks = build_context(&engine, &node, "sales").unwrap();
        let json = serde_json::to_value(&blocks).unwrap();
        assert_eq!(json[0]["kind"], "translation_notice");
        assert_eq!(json[0]["current_tier"], "HIGH");
        assert!(total_tokens(&blocks) > 0);
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 3);
    }
}
