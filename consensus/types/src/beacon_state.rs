use crate::{
    ChainSpec, Checkpoint, Domain, Epoch, ForkName, Hash256, PublicKeyBytes, Slot, Validator,
};
use ethereum_hashing::hash;
use safe_arith::{ArithError, SafeArith};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    UnknownValidator(usize),
    BalancesOutOfBounds(usize),
    BalancesLengthMismatch { validators: usize, balances: usize },
    EmptyRandaoMixes,
    ArithError(ArithError),
}

impl From<ArithError> for Error {
    fn from(e: ArithError) -> Error {
        Error::ArithError(e)
    }
}

/// A read-only snapshot of the beacon state at some slot.
///
/// Only the parts of the state required for duty and lifecycle computations are present. The
/// registry, balances and randao mixes are reference counted so that a snapshot can be cloned
/// cheaply and shared between concurrent computations; a snapshot is never mutated after it has
/// been built.
#[derive(Debug, Clone, PartialEq)]
pub struct BeaconState {
    pub slot: Slot,
    pub genesis_time: u64,
    pub state_root: Hash256,
    pub latest_block_root: Hash256,
    pub finalized_checkpoint: Checkpoint,
    validators: Arc<Vec<Validator>>,
    balances: Arc<Vec<u64>>,
    /// Circular buffer of randao mixes, indexed by `epoch % randao_mixes.len()`.
    randao_mixes: Arc<Vec<Hash256>>,
    pubkey_cache: Arc<HashMap<PublicKeyBytes, usize>>,
}

impl BeaconState {
    pub fn new(
        genesis_time: u64,
        slot: Slot,
        validators: Vec<Validator>,
        balances: Vec<u64>,
        randao_mixes: Vec<Hash256>,
    ) -> Result<Self, Error> {
        if validators.len() != balances.len() {
            return Err(Error::BalancesLengthMismatch {
                validators: validators.len(),
                balances: balances.len(),
            });
        }
        if randao_mixes.is_empty() {
            return Err(Error::EmptyRandaoMixes);
        }

        let pubkey_cache = validators
            .iter()
            .enumerate()
            .map(|(i, v)| (v.pubkey, i))
            .collect();

        Ok(Self {
            slot,
            genesis_time,
            state_root: Hash256::zero(),
            latest_block_root: Hash256::zero(),
            finalized_checkpoint: Checkpoint::default(),
            validators: Arc::new(validators),
            balances: Arc::new(balances),
            randao_mixes: Arc::new(randao_mixes),
            pubkey_cache: Arc::new(pubkey_cache),
        })
    }

    pub fn with_finalized_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.finalized_checkpoint = checkpoint;
        self
    }

    /// Returns a copy of this snapshot which reports `slot` as its slot. The registry is shared.
    pub fn with_slot(&self, slot: Slot) -> Self {
        Self {
            slot,
            ..self.clone()
        }
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn balances(&self) -> &[u64] {
        &self.balances
    }

    pub fn current_epoch(&self, spec: &ChainSpec) -> Epoch {
        self.slot.epoch(spec.slots_per_epoch)
    }

    pub fn fork_name(&self, spec: &ChainSpec) -> ForkName {
        spec.fork_name_at_slot(self.slot)
    }

    pub fn get_validator(&self, validator_index: usize) -> Result<&Validator, Error> {
        self.validators
            .get(validator_index)
            .ok_or(Error::UnknownValidator(validator_index))
    }

    pub fn get_balance(&self, validator_index: usize) -> Result<u64, Error> {
        self.balances
            .get(validator_index)
            .copied()
            .ok_or(Error::BalancesOutOfBounds(validator_index))
    }

    /// Returns the index of the validator with the given public key, if it is in the registry.
    pub fn get_validator_index(&self, pubkey: &PublicKeyBytes) -> Option<usize> {
        self.pubkey_cache.get(pubkey).copied()
    }

    /// Returns a list of all validator indices where the validator is active at the given
    /// `epoch`, in ascending order.
    pub fn get_active_validator_indices(&self, epoch: Epoch) -> Vec<usize> {
        get_active_validator_indices(&self.validators, epoch)
    }

    pub fn get_active_validator_count(&self, epoch: Epoch) -> usize {
        self.validators
            .iter()
            .filter(|v| v.is_active_at(epoch))
            .count()
    }

    pub fn get_randao_mix(&self, epoch: Epoch) -> Result<&Hash256, Error> {
        let len = self.randao_mixes.len() as u64;
        let i = epoch.as_u64().safe_rem(len)? as usize;
        self.randao_mixes.get(i).ok_or(Error::EmptyRandaoMixes)
    }

    /// Generate a seed for the given `epoch` and `domain`.
    pub fn get_seed(
        &self,
        epoch: Epoch,
        domain: Domain,
        spec: &ChainSpec,
    ) -> Result<Hash256, Error> {
        // The mix from `MIN_SEED_LOOKAHEAD + 1` epochs ago, wrapping around the buffer.
        let mix_epoch = epoch
            .safe_add(spec.epochs_per_historical_vector)?
            .safe_sub(spec.min_seed_lookahead)?
            .safe_sub(1u64)?;
        let mix = self.get_randao_mix(mix_epoch)?;

        let mut preimage = Vec::with_capacity(4 + 8 + 32);
        preimage.extend_from_slice(&spec.domain_type(domain));
        preimage.extend_from_slice(&epoch.as_u64().to_le_bytes());
        preimage.extend_from_slice(mix.as_bytes());

        Ok(Hash256::from_slice(&hash(&preimage)))
    }

    /// Returns the wall-clock time (seconds since the UNIX epoch) of the first slot of `epoch`.
    pub fn epoch_start_timestamp(&self, epoch: Epoch, spec: &ChainSpec) -> Result<u64, Error> {
        let seconds_per_epoch = spec.seconds_per_slot.safe_mul(spec.slots_per_epoch)?;
        Ok(self
            .genesis_time
            .safe_add(epoch.as_u64().safe_mul(seconds_per_epoch)?)?)
    }
}

/// Returns a list of all `validators` indices where the validator is active at the given
/// `epoch`.
pub fn get_active_validator_indices(validators: &[Validator], epoch: Epoch) -> Vec<usize> {
    let mut active = Vec::with_capacity(validators.len());

    for (index, validator) in validators.iter().enumerate() {
        if validator.is_active_at(epoch) {
            active.push(index)
        }
    }

    active.shrink_to_fit();

    active
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{active_validator, deterministic_pubkey, randao_mixes};

    fn state(spec: &ChainSpec, n: usize) -> BeaconState {
        let validators = (0..n).map(|i| active_validator(i, spec)).collect::<Vec<_>>();
        BeaconState::new(
            100,
            Slot::new(17),
            validators,
            vec![spec.max_effective_balance; n],
            randao_mixes(spec),
        )
        .unwrap()
    }

    #[test]
    fn rejects_malformed_snapshot() {
        let spec = ChainSpec::minimal();
        assert_eq!(
            BeaconState::new(
                0,
                Slot::new(0),
                vec![Validator::default()],
                vec![],
                randao_mixes(&spec),
            ),
            Err(Error::BalancesLengthMismatch {
                validators: 1,
                balances: 0
            })
        );
        assert_eq!(
            BeaconState::new(0, Slot::new(0), vec![], vec![], vec![]),
            Err(Error::EmptyRandaoMixes)
        );
    }

    #[test]
    fn pubkey_lookup() {
        let spec = ChainSpec::minimal();
        let state = state(&spec, 4);
        assert_eq!(state.get_validator_index(&deterministic_pubkey(3)), Some(3));
        assert_eq!(state.get_validator_index(&deterministic_pubkey(4)), None);
        assert_eq!(state.get_validator(4), Err(Error::UnknownValidator(4)));
    }

    #[test]
    fn seeds_differ_by_epoch_and_domain() {
        let spec = ChainSpec::minimal();
        let state = state(&spec, 4);
        let a = state.get_seed(Epoch::new(1), Domain::BeaconAttester, &spec).unwrap();
        let b = state.get_seed(Epoch::new(2), Domain::BeaconAttester, &spec).unwrap();
        let c = state.get_seed(Epoch::new(1), Domain::BeaconProposer, &spec).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(
            a,
            state.get_seed(Epoch::new(1), Domain::BeaconAttester, &spec).unwrap()
        );
    }

    #[test]
    fn epoch_timestamps() {
        let spec = ChainSpec::minimal();
        let state = state(&spec, 1);
        assert_eq!(state.current_epoch(&spec), Epoch::new(2));
        assert_eq!(state.epoch_start_timestamp(Epoch::new(0), &spec), Ok(100));
        assert_eq!(state.epoch_start_timestamp(Epoch::new(2), &spec), Ok(100 + 2 * 8 * 6));
        assert!(state.epoch_start_timestamp(Epoch::max_value(), &spec).is_err());
    }

    #[test]
    fn with_slot_shares_registry() {
        let spec = ChainSpec::minimal();
        let state = state(&spec, 8);
        let later = state.with_slot(Slot::new(64));
        assert_eq!(later.current_epoch(&spec), Epoch::new(8));
        assert_eq!(later.validators(), state.validators());
        assert_eq!(later.get_active_validator_count(Epoch::new(0)), 8);
    }
}
