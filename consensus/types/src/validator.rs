use crate::{ChainSpec, Epoch, PublicKeyBytes};
use serde::{Deserialize, Serialize};

/// Information about a `BeaconChain` validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Validator {
    pub pubkey: PublicKeyBytes,
    #[serde(with = "serde_utils::quoted_u64")]
    pub effective_balance: u64,
    pub slashed: bool,
    pub activation_eligibility_epoch: Epoch,
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
    pub withdrawable_epoch: Epoch,
}

impl Validator {
    /// Returns `true` if the validator is considered active at some epoch.
    pub fn is_active_at(&self, epoch: Epoch) -> bool {
        self.activation_epoch <= epoch && epoch < self.exit_epoch
    }

    /// Returns `true` if the validator has been placed in the activation queue and has not yet
    /// been assigned an activation epoch.
    pub fn is_awaiting_activation(&self, spec: &ChainSpec) -> bool {
        self.activation_eligibility_epoch != spec.far_future_epoch
            && self.activation_epoch == spec.far_future_epoch
    }

    /// Returns `true` if the validator has initiated an exit.
    pub fn has_initiated_exit(&self, spec: &ChainSpec) -> bool {
        self.exit_epoch != spec.far_future_epoch
    }
}

impl Default for Validator {
    /// Yields a "default" `Validator`. Primarily used for testing.
    fn default() -> Self {
        Self {
            pubkey: PublicKeyBytes::empty(),
            effective_balance: u64::MAX,
            slashed: false,
            activation_eligibility_epoch: Epoch::max_value(),
            activation_epoch: Epoch::max_value(),
            exit_epoch: Epoch::max_value(),
            withdrawable_epoch: Epoch::max_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default() {
        let v = Validator::default();

        let epoch = Epoch::new(0);

        assert!(!v.is_active_at(epoch));
        assert!(!v.slashed);
    }

    #[test]
    fn is_active_at() {
        let epoch = Epoch::new(10);

        let v = Validator {
            activation_epoch: epoch,
            ..Validator::default()
        };

        assert!(!v.is_active_at(epoch - 1));
        assert!(v.is_active_at(epoch));
        assert!(v.is_active_at(epoch + 1));
    }

    #[test]
    fn awaiting_activation() {
        let spec = ChainSpec::minimal();
        let v = Validator {
            activation_eligibility_epoch: Epoch::new(3),
            ..Validator::default()
        };

        assert!(v.is_awaiting_activation(&spec));
        assert!(!v.has_initiated_exit(&spec));

        let exiting = Validator {
            exit_epoch: Epoch::new(9),
            ..v
        };
        assert!(exiting.has_initiated_exit(&spec));
    }

    #[test]
    fn serde_quotes_balance() {
        let v = Validator {
            effective_balance: 32,
            ..Validator::default()
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["effective_balance"], "32");
        assert_eq!(serde_json::from_value::<Validator>(json).unwrap(), v);
    }
}
