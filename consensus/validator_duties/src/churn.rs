//! Per-epoch churn limits.
//!
//! The limit formula changes across protocol upgrades. Every caller goes through
//! `churn_strategy(fork)` so the activation queue, the exit queue and the activation projection
//! cannot disagree about which formula is in effect.

use std::cmp::{max, min};
use types::{ChainSpec, ForkName};

pub trait ChurnStrategy: Send + Sync {
    /// The maximum number of validators that may be activated in one epoch.
    fn activation_churn_limit(&self, active_validator_count: u64, spec: &ChainSpec) -> u64;

    /// The maximum number of validators that may exit in one epoch.
    fn exit_churn_limit(&self, active_validator_count: u64, spec: &ChainSpec) -> u64;
}

/// `max(MIN_PER_EPOCH_CHURN_LIMIT, active / CHURN_LIMIT_QUOTIENT)`, shared by both directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseChurn;

/// Deneb (EIP-7514) caps activations at `MAX_PER_EPOCH_ACTIVATION_CHURN_LIMIT`. Exits keep the
/// base formula.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenebChurn;

static BASE: BaseChurn = BaseChurn;
static DENEB: DenebChurn = DenebChurn;

/// Returns the churn formula in effect at `fork`.
pub fn churn_strategy(fork: ForkName) -> &'static dyn ChurnStrategy {
    match fork {
        ForkName::Base | ForkName::Altair | ForkName::Bellatrix | ForkName::Capella => &BASE,
        ForkName::Deneb => &DENEB,
    }
}

/// The churn limit shared by activations and exits before Deneb.
pub fn get_churn_limit(active_validator_count: u64, spec: &ChainSpec) -> u64 {
    max(
        spec.min_per_epoch_churn_limit,
        active_validator_count
            .checked_div(spec.churn_limit_quotient)
            .unwrap_or(0),
    )
}

impl ChurnStrategy for BaseChurn {
    fn activation_churn_limit(&self, active_validator_count: u64, spec: &ChainSpec) -> u64 {
        get_churn_limit(active_validator_count, spec)
    }

    fn exit_churn_limit(&self, active_validator_count: u64, spec: &ChainSpec) -> u64 {
        get_churn_limit(active_validator_count, spec)
    }
}

impl ChurnStrategy for DenebChurn {
    fn activation_churn_limit(&self, active_validator_count: u64, spec: &ChainSpec) -> u64 {
        min(
            spec.max_per_epoch_activation_churn_limit,
            get_churn_limit(active_validator_count, spec),
        )
    }

    fn exit_churn_limit(&self, active_validator_count: u64, spec: &ChainSpec) -> u64 {
        get_churn_limit(active_validator_count, spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_churn() {
        let spec = ChainSpec::mainnet();
        let base = churn_strategy(ForkName::Capella);
        assert_eq!(base.activation_churn_limit(0, &spec), 4);
        assert_eq!(base.activation_churn_limit(65_536 * 4, &spec), 4);
        assert_eq!(base.activation_churn_limit(65_536 * 5 + 1, &spec), 5);
        assert_eq!(base.activation_churn_limit(65_536 * 20, &spec), 20);
        assert_eq!(base.exit_churn_limit(65_536 * 20, &spec), 20);
    }

    #[test]
    fn deneb_caps_activations_only() {
        let spec = ChainSpec::mainnet();
        let deneb = churn_strategy(ForkName::Deneb);
        assert_eq!(deneb.activation_churn_limit(65_536 * 20, &spec), 8);
        assert_eq!(deneb.exit_churn_limit(65_536 * 20, &spec), 20);
        // Below the cap both formulas agree.
        assert_eq!(deneb.activation_churn_limit(65_536 * 6, &spec), 6);
    }

    #[test]
    fn every_fork_has_a_strategy() {
        let spec = ChainSpec::minimal();
        for fork in ForkName::list_all() {
            let floor = spec
                .min_per_epoch_churn_limit
                .min(spec.max_per_epoch_activation_churn_limit);
            assert!(churn_strategy(fork).activation_churn_limit(0, &spec) >= floor);
        }
    }

    #[test]
    fn zero_quotient_does_not_panic() {
        let spec = ChainSpec {
            churn_limit_quotient: 0,
            ..ChainSpec::minimal()
        };
        assert_eq!(get_churn_limit(1_000, &spec), spec.min_per_epoch_churn_limit);
    }
}
