//! Classifies a validator record into a lifecycle state at some epoch.
//!
//! Rules are evaluated top-down and the first match wins, so every record maps to exactly one
//! state. Nothing is stored between queries; the state is derived fresh from the record each time.

use safe_arith::SafeArith;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoStaticStr};
use types::{ChainSpec, Epoch, Validator};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValidatorStatus {
    /// No record for the public key exists in the registry.
    Unknown,
    /// Deposit processed, not yet eligible for the activation queue.
    Deposited,
    /// Eligible and waiting for activation.
    Pending,
    Active,
    /// Voluntary exit initiated, not yet exited.
    Exiting,
    /// Slashed and awaiting the forced exit.
    Slashing,
    Exited,
}

impl ValidatorStatus {
    /// Returns `true` if validators in this state report their effective balance.
    pub fn reports_effective_balance(self) -> bool {
        matches!(
            self,
            ValidatorStatus::Active | ValidatorStatus::Exiting | ValidatorStatus::Slashing
        )
    }

    /// Returns `true` if the validator is still waiting to be activated.
    pub fn is_queued_for_activation(self) -> bool {
        matches!(self, ValidatorStatus::Deposited | ValidatorStatus::Pending)
    }
}

impl std::fmt::Display for ValidatorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s: &'static str = self.into();
        write!(f, "{}", s)
    }
}

impl slog::Value for ValidatorStatus {
    fn serialize(
        &self,
        _record: &slog::Record,
        key: slog::Key,
        serializer: &mut dyn slog::Serializer,
    ) -> slog::Result {
        let s: &'static str = self.into();
        serializer.emit_str(key, s)
    }
}

/// A lifecycle state plus the estimated time of the next transition out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleStatus {
    pub status: ValidatorStatus,
    /// The epoch at which the next transition happens, if one is scheduled.
    pub transition_epoch: Option<Epoch>,
    /// Seconds since the UNIX epoch of `transition_epoch`, or `0` if it cannot be projected.
    #[serde(with = "serde_utils::quoted_u64")]
    pub transition_timestamp: u64,
}

/// Returns the lifecycle state of `validator` at `epoch`. `None` is an unknown validator.
pub fn classify(validator: Option<&Validator>, epoch: Epoch, spec: &ChainSpec) -> ValidatorStatus {
    let Some(validator) = validator else {
        return ValidatorStatus::Unknown;
    };

    if epoch < validator.activation_eligibility_epoch {
        ValidatorStatus::Deposited
    } else if epoch < validator.activation_epoch {
        ValidatorStatus::Pending
    } else if !validator.has_initiated_exit(spec) {
        ValidatorStatus::Active
    } else if epoch < validator.exit_epoch {
        if validator.slashed {
            ValidatorStatus::Slashing
        } else {
            ValidatorStatus::Exiting
        }
    } else {
        ValidatorStatus::Exited
    }
}

/// Classify `validator` and project the timestamp of its next transition.
pub fn lifecycle_status(
    validator: Option<&Validator>,
    epoch: Epoch,
    genesis_time: u64,
    spec: &ChainSpec,
) -> LifecycleStatus {
    let status = classify(validator, epoch, spec);

    let transition_epoch = validator
        .and_then(|v| match status {
            ValidatorStatus::Unknown | ValidatorStatus::Active => None,
            ValidatorStatus::Deposited => Some(v.activation_eligibility_epoch),
            ValidatorStatus::Pending => Some(v.activation_epoch),
            ValidatorStatus::Exiting | ValidatorStatus::Slashing => Some(v.exit_epoch),
            ValidatorStatus::Exited => Some(v.withdrawable_epoch),
        })
        .filter(|e| *e != spec.far_future_epoch);

    LifecycleStatus {
        status,
        transition_epoch,
        transition_timestamp: transition_epoch
            .map_or(0, |e| epoch_to_timestamp(e, genesis_time, spec)),
    }
}

/// `genesis_time + epoch * SLOTS_PER_EPOCH * SECONDS_PER_SLOT`, or `0` on overflow.
pub fn epoch_to_timestamp(epoch: Epoch, genesis_time: u64, spec: &ChainSpec) -> u64 {
    spec.seconds_per_slot
        .safe_mul(spec.slots_per_epoch)
        .and_then(|seconds_per_epoch| epoch.as_u64().safe_mul(seconds_per_epoch))
        .and_then(|offset| genesis_time.safe_add(offset))
        .unwrap_or(0)
}
