//! EIP-1559 fee pricing and replacement escalation.

use serde::Serialize;

use crate::{
    chain::{ChainEndpoint, GasSuggestion},
    config::{ChainConfig, FeePolicy},
    error::BridgeError,
};

/// Fees offered by one transaction attempt, in wei per gas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeProfile {
    pub base_fee_per_gas: u128,
    pub priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    /// Escalations applied since the first attempt.
    pub bump_count: u32,
}

impl FeeProfile {
    /// Whether this profile can still be included at `base_fee`.
    pub const fn covers(&self, base_fee: u128) -> bool {
        self.max_fee_per_gas >= base_fee.saturating_add(self.priority_fee_per_gas)
    }
}

#[derive(Debug, Clone)]
pub struct FeeEstimator {
    policy: FeePolicy,
}

impl FeeEstimator {
    pub const fn new(policy: FeePolicy) -> Self {
        Self { policy }
    }

    pub const fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }

    /// Price a first attempt from `suggestion`.
    ///
    /// The tip never drops below the chain's floor and the fee cap is
    /// `base * multiplier + 2 * tip`.
    pub fn initial_profile(&self, chain: &ChainConfig, suggestion: GasSuggestion) -> FeeProfile {
        let base_fee = suggestion.base_fee.unwrap_or(self.policy.fallback_base_fee_wei);
        let priority_fee = suggestion.priority_fee.unwrap_or_default().max(chain.priority_fee_floor_wei);
        let max_fee = scale_up(base_fee, chain.base_fee_multiplier_percent)
            .saturating_add(priority_fee.saturating_mul(2));

        FeeProfile {
            base_fee_per_gas: base_fee,
            priority_fee_per_gas: priority_fee,
            max_fee_per_gas: max_fee,
            bump_count: 0,
        }
    }

    /// Fetch a suggestion from `endpoint` and price a first attempt.
    pub async fn profile_for(&self, endpoint: &ChainEndpoint) -> Result<FeeProfile, BridgeError> {
        let suggestion = endpoint.current_gas_suggestion().await?;
        Ok(self.initial_profile(endpoint.config(), suggestion))
    }

    /// Price the replacement of `prior`.
    ///
    /// Both fee fields grow by the bump factor and are clamped to at least `live`,
    /// so no field ever decreases. Returns `None` once the attempt ceiling is
    /// reached.
    pub fn escalate(&self, prior: &FeeProfile, live: &FeeProfile) -> Option<FeeProfile> {
        if prior.bump_count.saturating_add(1) >= self.policy.max_attempts {
            return None;
        }

        let priority_fee = scale_up(prior.priority_fee_per_gas, self.policy.bump_percent)
            .max(live.priority_fee_per_gas)
            .max(prior.priority_fee_per_gas);
        let max_fee = scale_up(prior.max_fee_per_gas, self.policy.bump_percent)
            .max(live.max_fee_per_gas)
            .max(prior.max_fee_per_gas)
            .max(priority_fee);

        Some(FeeProfile {
            base_fee_per_gas: prior.base_fee_per_gas.max(live.base_fee_per_gas),
            priority_fee_per_gas: priority_fee,
            max_fee_per_gas: max_fee,
            bump_count: prior.bump_count + 1,
        })
    }
}

/// `value * percent / 100`, rounded up.
fn scale_up(value: u128, percent: u64) -> u128 {
    let scaled = value.saturating_mul(u128::from(percent));
    scaled / 100 + u128::from(scaled % 100 != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GWEI;
    use test_case::test_case;

    fn estimator() -> FeeEstimator {
        FeeEstimator::new(FeePolicy::default())
    }

    #[test]
    fn initial_profile_applies_l1_policy() {
        let suggestion = GasSuggestion { base_fee: Some(10 * GWEI), priority_fee: Some(GWEI) };
        let profile = estimator().initial_profile(&ChainConfig::sepolia(), suggestion);

        assert_eq!(profile.base_fee_per_gas, 10 * GWEI);
        assert_eq!(profile.priority_fee_per_gas, 8 * GWEI);
        assert_eq!(profile.max_fee_per_gas, 40 * GWEI + 16 * GWEI);
        assert_eq!(profile.bump_count, 0);
    }

    #[test]
    fn initial_profile_falls_back_without_history() {
        let profile = estimator().initial_profile(&ChainConfig::giwa_sepolia(), GasSuggestion::default());

        assert_eq!(profile.base_fee_per_gas, 2 * GWEI);
        assert_eq!(profile.priority_fee_per_gas, 2 * GWEI);
        // 2 gwei * 2.5 + 2 * 2 gwei
        assert_eq!(profile.max_fee_per_gas, 9 * GWEI);
    }

    #[test]
    fn suggested_tip_above_floor_is_kept() {
        let suggestion = GasSuggestion { base_fee: Some(GWEI), priority_fee: Some(5 * GWEI) };
        let profile = estimator().initial_profile(&ChainConfig::giwa_sepolia(), suggestion);
        assert_eq!(profile.priority_fee_per_gas, 5 * GWEI);
    }

    #[test]
    fn escalation_bumps_by_policy() {
        let prior = FeeProfile {
            base_fee_per_gas: 10,
            priority_fee_per_gas: 100,
            max_fee_per_gas: 1_000,
            bump_count: 0,
        };
        let bumped = estimator().escalate(&prior, &prior).unwrap();

        assert_eq!(bumped.priority_fee_per_gas, 125);
        assert_eq!(bumped.max_fee_per_gas, 1_250);
        assert_eq!(bumped.bump_count, 1);
    }

    #[test]
    fn escalation_rounds_up() {
        let prior = FeeProfile {
            base_fee_per_gas: 1,
            priority_fee_per_gas: 3,
            max_fee_per_gas: 7,
            bump_count: 0,
        };
        let bumped = estimator().escalate(&prior, &prior).unwrap();
        assert_eq!(bumped.priority_fee_per_gas, 4);
        assert_eq!(bumped.max_fee_per_gas, 9);
    }

    #[test]
    fn escalation_clamps_to_live_market() {
        let prior = FeeProfile {
            base_fee_per_gas: 10 * GWEI,
            priority_fee_per_gas: GWEI,
            max_fee_per_gas: 20 * GWEI,
            bump_count: 1,
        };
        let live = FeeProfile {
            base_fee_per_gas: 50 * GWEI,
            priority_fee_per_gas: 3 * GWEI,
            max_fee_per_gas: 200 * GWEI,
            bump_count: 0,
        };
        let bumped = estimator().escalate(&prior, &live).unwrap();

        assert_eq!(bumped.base_fee_per_gas, 50 * GWEI);
        assert_eq!(bumped.priority_fee_per_gas, 3 * GWEI);
        assert_eq!(bumped.max_fee_per_gas, 200 * GWEI);
        assert_eq!(bumped.bump_count, 2);
    }

    #[test]
    fn escalation_never_decreases() {
        let estimator = estimator();
        let mut live = estimator.initial_profile(
            &ChainConfig::sepolia(),
            GasSuggestion { base_fee: Some(30 * GWEI), priority_fee: Some(GWEI) },
        );
        let mut current = live;
        let mut collapsing_market = 30 * GWEI;

        while let Some(next) = estimator.escalate(&current, &live) {
            assert!(next.priority_fee_per_gas >= current.priority_fee_per_gas);
            assert!(next.max_fee_per_gas > current.max_fee_per_gas);
            assert!(next.base_fee_per_gas >= current.base_fee_per_gas);
            assert!(next.max_fee_per_gas >= next.priority_fee_per_gas);
            assert_eq!(next.bump_count, current.bump_count + 1);

            collapsing_market /= 3;
            live = estimator.initial_profile(
                &ChainConfig::sepolia(),
                GasSuggestion { base_fee: Some(collapsing_market), priority_fee: None },
            );
            current = next;
        }
        assert_eq!(current.bump_count + 1, FeePolicy::default().max_attempts);
    }

    #[test_case(1 => 0)]
    #[test_case(2 => 1)]
    #[test_case(5 => 4)]
    fn attempt_ceiling_bounds_escalations(max_attempts: u32) -> u32 {
        let estimator = FeeEstimator::new(FeePolicy { max_attempts, ..Default::default() });
        let mut current = estimator.initial_profile(&ChainConfig::giwa_sepolia(), GasSuggestion::default());
        let mut escalations = 0;
        while let Some(next) = estimator.escalate(&current, &current) {
            current = next;
            escalations += 1;
        }
        escalations
    }

    #[test]
    fn covers_checks_base_plus_tip() {
        let profile = FeeProfile {
            base_fee_per_gas: 10,
            priority_fee_per_gas: 5,
            max_fee_per_gas: 20,
            bump_count: 0,
        };
        assert!(profile.covers(15));
        assert!(!profile.covers(16));
    }
}
