//! Model-tier routing (C8).
//!
//! Pure function of token count and complexity. The default policy
//! table lives in [`crate::config::RouterPolicy`]; this module only
//! walks it and memoizes the local-tier availability probe per request.

use crate::config::RouterPolicy;
use crate::types::{ModelTier, RoutingDecision};

/// Chooses a downstream model tier from token count and complexity (C8).
#[derive(Debug, Clone)]
pub struct ModelRouter {
    policy: RouterPolicy,
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self { policy: RouterPolicy::default() }
    }
}

impl ModelRouter {
    /// Build a router with a specific policy table.
    pub fn new(policy: RouterPolicy) -> Self {
        Self { policy }
    }

    /// Route `(tokens, complexity)` to a tier, consulting the policy's
    /// rules in order. `local_available` is the memoized per-request
    /// probe result for the local tier ; when `false`, a rule
    /// that would select [`ModelTier::LocalFree`] falls through to the
    /// next rule instead.
    pub fn route(&self, tokens: u32, complexity: f64, local_available: bool) -> RoutingDecision {
        for rule in &self.policy.rules {
            if tokens < rule.max_tokens && complexity < rule.max_complexity {
                if rule.tier == ModelTier::LocalFree && !local_available {
                    continue;
                }
                return RoutingDecision {
                    model: rule.tier,
                    provider: Self::provider_for(rule.tier).to_string(),
                    reason: format!(
                        "{} tokens and {:.2} complexity matched the {} tier policy",
                        tokens, complexity, rule.tier
                    ),
                    estimated_cost: Self::estimated_cost(rule.tier, tokens),
                };
            }
        }
        RoutingDecision {
            model: ModelTier::PremiumCloud,
            provider: Self::provider_for(ModelTier::PremiumCloud).to_string(),
            reason: "no policy rule matched; falling back to the highest-capability tier".to_string(),
            estimated_cost: Self::estimated_cost(ModelTier::PremiumCloud, tokens),
        }
    }

    fn provider_for(tier: ModelTier) -> &'static str {
        match tier {
            ModelTier::LocalFree => "local",
            ModelTier::CloudFree | ModelTier::CheapCloud | ModelTier::BalancedCloud | ModelTier::PremiumCloud => {
                "cloud"
            }
        }
    }

    /// Abstract per-1000-token cost units, used only to populate
    /// `estimated_cost`; callers that need real pricing supply their
    /// own `LanguageModelClient`.
    fn estimated_cost(tier: ModelTier, tokens: u32) -> f64 {
        let per_thousand = match tier {
            ModelTier::LocalFree => 0.0,
            ModelTier::CloudFree => 0.0,
            ModelTier::CheapCloud => 0.001,
            ModelTier::BalancedCloud => 0.01,
            ModelTier::PremiumCloud => 0.03,
        };
        (tokens as f64 / 1000.0) * per_thousand
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_tokens_low_complexity_routes_local() {
        let router = ModelRouter::default();
        let decision = router.route(1_000, 0.2, true);
        assert_eq!(decision.model, ModelTier::LocalFree);
    }

    #[test]
    fn local_unavailable_falls_through_to_cloud_free() {
        let router = ModelRouter::default();
        let decision = router.route(1_000, 0.2, false);
        assert_eq!(decision.model, ModelTier::CloudFree);
    }

    #[test]
    fn high_tokens_routes_premium() {
        let router = ModelRouter::default();
        let decision = router.route(200_000, 0.9, true);
        assert_eq!(decision.model, ModelTier::PremiumCloud);
    }

    #[test]
    fn free_tiers_have_zero_cost() {
        let router = ModelRouter::default();
        let decision = router.route(1_000, 0.2, true);
        assert_eq!(decision.estimated_cost, 0.0);
    }
}
