//! Configuration types

use crate::{ConfigError, PrismError, PrismResult, Tier};
use serde::{Deserialize, Serialize};

/// Weights the preservation scorer gives each field origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Direct/common copy from a non-empty source
    pub preserved: f64,
    /// Compute result derived from at least one non-empty source
    pub mapped: f64,
    /// Auto-generated with no source dependency
    pub auto: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            preserved: 1.0,
            mapped: 0.85,
            auto: 0.2,
        }
    }
}

/// Score thresholds for compatibility tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Minimum score for `HIGH`
    pub high: u8,
    /// Minimum score for `MEDIUM`
    pub medium: u8,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            high: 85,
            medium: 50,
        }
    }
}

impl TierThresholds {
    pub fn tier_for(&self, score: u8) -> Tier {
        if score >= self.high {
            Tier::High
        } else if score >= self.medium {
            Tier::Medium
        } else {
            Tier::Low
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub weights: ScoreWeights,
    pub tiers: TierThresholds,
    /// Expected score for a pair with no declared entry, no observations,
    /// and no rule set.
    pub unruled_pair_expected_score: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            tiers: TierThresholds::default(),
            unruled_pair_expected_score: 0,
        }
    }
}

impl EngineConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `PRISM_WEIGHT_PRESERVED`: weight of preserved fields (default: 1.0)
    /// - `PRISM_WEIGHT_MAPPED`: weight of computed fields (default: 0.85)
    /// - `PRISM_WEIGHT_AUTO`: weight of auto-generated fields (default: 0.2)
    /// - `PRISM_TIER_HIGH`: minimum score for HIGH (default: 85)
    /// - `PRISM_TIER_MEDIUM`: minimum score for MEDIUM (default: 50)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(fallback)
        }

        Self {
            weights: ScoreWeights {
                preserved: env_or("PRISM_WEIGHT_PRESERVED", defaults.weights.preserved),
                mapped: env_or("PRISM_WEIGHT_MAPPED", defaults.weights.mapped),
                auto: env_or("PRISM_WEIGHT_AUTO", defaults.weights.auto),
            },
            tiers: TierThresholds {
                high: env_or("PRISM_TIER_HIGH", defaults.tiers.high),
                medium: env_or("PRISM_TIER_MEDIUM", defaults.tiers.medium),
            },
            unruled_pair_expected_score: defaults.unruled_pair_expected_score,
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - every weight in [0.0, 1.0]
    /// - 0 < tiers.medium <= tiers.high <= 100
    /// - unruled_pair_expected_score <= 100
    pub fn validate(&self) -> PrismResult<()> {
        let weights = [
            ("weights.preserved", self.weights.preserved),
            ("weights.mapped", self.weights.mapped),
            ("weights.auto", self.weights.auto),
        ];
        for (field, value) in weights {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, value, "weight must be between 0.0 and 1.0"));
            }
        }

        if self.tiers.high > 100 {
            return Err(invalid("tiers.high", self.tiers.high, "must be at most 100"));
        }

        if self.tiers.medium == 0 || self.tiers.medium > self.tiers.high {
            return Err(invalid(
                "tiers.medium",
                self.tiers.medium,
                "must be positive and not above tiers.high",
            ));
        }

        if self.unruled_pair_expected_score > 100 {
            return Err(invalid(
                "unruled_pair_expected_score",
                self.unruled_pair_expected_score,
                "must be at most 100",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> PrismError {
    PrismError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}

// ============================================================================
// TESTS
// ============================================================================
