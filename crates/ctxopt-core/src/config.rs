//! Tunable parameters for the optimization pipeline.
//!
//! Every struct here is a plain immutable value with a `Default` impl;
//! none of them touch the filesystem or the environment. Per the core's
//! external-interfaces contract, no configuration file or environment
//! variable is read inside this crate — that precedence chain belongs
//! to callers (the `ctxopt-cli` binary implements one).

use serde::{Deserialize, Serialize};

use crate::types::{CompressionLevel, IntentType, ModelTier, Scope};

/// Weights for the five relevance factors combined in C4. Kept in one
/// place so a change to the formula cannot silently drift from its
/// documentation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight of the semantic (cosine similarity) factor.
    pub semantic: f64,
    /// Weight of the symbol-match factor.
    pub symbol: f64,
    /// Weight of the file/directory proximity factor.
    pub proximity: f64,
    /// Weight of the recency factor.
    pub recency: f64,
    /// Weight of the usage-frequency factor.
    pub frequency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            semantic: 0.40,
            symbol: 0.25,
            proximity: 0.20,
            recency: 0.10,
            frequency: 0.05,
        }
    }
}

/// Defaults fed to the chunk selector (C5) when a caller doesn't override them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SelectionDefaults {
    /// Fraction of the budget the selector may exceed for high-score chunks.
    pub overage_allowance: f64,
    /// Minimum relevance score to be considered at all.
    pub min_relevance: f64,
    /// Selector stops once `spent >= early_stop_fraction * budget`.
    pub early_stop_fraction: f64,
    /// Relevance threshold above which overage spending is allowed.
    pub overage_score_threshold: f64,
}

impl Default for SelectionDefaults {
    fn default() -> Self {
        Self {
            overage_allowance: 0.10,
            min_relevance: 0.0,
            early_stop_fraction: 0.95,
            overage_score_threshold: 0.8,
        }
    }
}

/// Defaults fed to the adaptive compressor (C6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompressionDefaults {
    /// Keep import/require statements verbatim even under medium compression.
    pub preserve_imports: bool,
    /// Keep type signatures verbatim under aggressive compression.
    pub preserve_types: bool,
}

impl Default for CompressionDefaults {
    fn default() -> Self {
        Self {
            preserve_imports: false,
            preserve_types: true,
        }
    }
}

/// One rule in the model router's tiering policy (C8), evaluated in order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RouterRule {
    /// Tokens must be strictly less than this bound to match (use `u32::MAX` for "no bound").
    pub max_tokens: u32,
    /// Complexity must be strictly less than this bound to match (use `1.0` for "no bound").
    pub max_complexity: f64,
    /// Tier selected when this rule matches.
    pub tier: ModelTier,
}

/// The ordered policy table consulted by the router (C8). Rules are
/// tried in order; later rules are only reached if every earlier rule
/// fails to match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterPolicy {
    /// Rules tried in order; the first match wins.
    pub rules: Vec<RouterRule>,
}

impl Default for RouterPolicy {
    fn default() -> Self {
        Self {
            rules: vec![
                RouterRule { max_tokens: 8_000, max_complexity: 0.6, tier: ModelTier::LocalFree },
                RouterRule { max_tokens: 50_000, max_complexity: 0.7, tier: ModelTier::CloudFree },
                RouterRule { max_tokens: 50_000, max_complexity: 0.6, tier: ModelTier::CheapCloud },
                RouterRule { max_tokens: 100_000, max_complexity: 1.0, tier: ModelTier::BalancedCloud },
                RouterRule { max_tokens: u32::MAX, max_complexity: 1.0, tier: ModelTier::PremiumCloud },
            ],
        }
    }
}

/// Per-intent-type defaults consulted by the intent analyzer (C2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntentTypeDefaults {
    /// Base token budget before scope/complexity scaling.
    pub base_budget: u32,
    /// Maximum chunks the selector may include for this intent type.
    pub max_chunks: usize,
}

/// Table of [`IntentTypeDefaults`] for every [`IntentType`] variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDefaults {
    /// Shared `min_relevance` default across all intent types.
    pub min_relevance: f64,
}

impl Default for IntentDefaults {
    fn default() -> Self {
        Self { min_relevance: 0.3 }
    }
}

impl IntentDefaults {
    /// Base budget and max-chunks table.
    pub fn for_type(intent_type: IntentType) -> IntentTypeDefaults {
        match intent_type {
            IntentType::BugFix => IntentTypeDefaults { base_budget: 8_000, max_chunks: 20 },
            IntentType::FeatureAdd => IntentTypeDefaults { base_budget: 10_000, max_chunks: 30 },
            IntentType::Explain => IntentTypeDefaults { base_budget: 5_000, max_chunks: 10 },
            IntentType::Refactor => IntentTypeDefaults { base_budget: 7_000, max_chunks: 25 },
            IntentType::Test => IntentTypeDefaults { base_budget: 6_000, max_chunks: 15 },
            IntentType::Search => IntentTypeDefaults { base_budget: 3_000, max_chunks: 50 },
            IntentType::General => IntentTypeDefaults { base_budget: 4_000, max_chunks: 15 },
        }
    }

    /// Compression level implied by a complexity score.
    pub fn compression_level_for_complexity(complexity: f64) -> CompressionLevel {
        if complexity < 0.3 {
            CompressionLevel::Light
        } else if complexity > 0.7 {
            CompressionLevel::Aggressive
        } else {
            CompressionLevel::Medium
        }
    }

    /// `prefer_diversity` default, true only for project scope.
    pub fn prefer_diversity_for_scope(scope: Scope) -> bool {
        matches!(scope, Scope::Project)
    }
}

/// Top-level knob bundle threaded through the orchestrator (C9). Each
/// field is independently overridable; callers that want the built-in
/// defaults everywhere can use `PipelineConfig::default()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Relevance-scoring weights (C4).
    pub scoring_weights: ScoringWeights,
    /// Selection knobs (C5).
    pub selection: SelectionDefaults,
    /// Compression knobs (C6).
    pub compression: CompressionDefaults,
    /// Routing policy (C8).
    pub router_policy: RouterPolicy,
    /// Intent-analysis knobs (C2).
    pub intent_defaults: IntentDefaults,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scoring_weights_sum_to_one() {
        let w = ScoringWeights::default();
        let sum = w.semantic + w.symbol + w.proximity + w.recency + w.frequency;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn router_policy_rules_are_ordered_ascending() {
        let policy = RouterPolicy::default();
        for pair in policy.rules.windows(2) {
            assert!(pair[0].max_tokens <= pair[1].max_tokens);
        }
    }

    #[test]
    fn intent_defaults_cover_every_type() {
        for t in [
            IntentType::BugFix,
            IntentType::FeatureAdd,
            IntentType::Explain,
            IntentType::Refactor,
            IntentType::Test,
            IntentType::Search,
            IntentType::General,
        ] {
            let d = IntentDefaults::for_type(t);
            assert!(d.base_budget > 0);
            assert!(d.max_chunks > 0);
        }
    }
}
