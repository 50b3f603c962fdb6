//! Deterministic fixtures for tests in this crate and its dependents.
use crate::{ChainSpec, Epoch, Hash256, PublicKeyBytes, Validator};
use ethereum_hashing::hash;

/// A unique, deterministic public key for validator `index`.
///
/// The bytes are not a valid BLS point; they are only used as a registry identifier.
pub fn deterministic_pubkey(index: usize) -> PublicKeyBytes {
    let mut bytes = [0u8; 48];
    bytes[0] = 0x80;
    bytes[40..48].copy_from_slice(&(index as u64).to_le_bytes());
    PublicKeyBytes::deserialize(&bytes).unwrap_or_default()
}

/// A validator that has been active since genesis with the maximum effective balance.
pub fn active_validator(index: usize, spec: &ChainSpec) -> Validator {
    Validator {
        pubkey: deterministic_pubkey(index),
        effective_balance: spec.max_effective_balance,
        slashed: false,
        activation_eligibility_epoch: Epoch::new(0),
        activation_epoch: Epoch::new(0),
        exit_epoch: spec.far_future_epoch,
        withdrawable_epoch: spec.far_future_epoch,
    }
}

/// A validator which has deposited but is not yet eligible for activation.
pub fn deposited_validator(index: usize, spec: &ChainSpec) -> Validator {
    Validator {
        activation_eligibility_epoch: spec.far_future_epoch,
        activation_epoch: spec.far_future_epoch,
        ..active_validator(index, spec)
    }
}

/// A full buffer of distinct randao mixes.
pub fn randao_mixes(spec: &ChainSpec) -> Vec<Hash256> {
    (0..spec.epochs_per_historical_vector)
        .map(|i| Hash256::from_slice(&hash(&i.to_le_bytes())))
        .collect()
}
