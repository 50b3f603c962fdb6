//! The read-only view of the chain this service computes against.

use types::{BeaconState, BeaconStateError, ChainSpec, Domain, Epoch, Hash256, Slot};

#[derive(Debug, Clone, PartialEq)]
pub enum StateProviderError {
    /// No canonical state is known at the slot.
    StateNotFound(Slot),
    FinalizedStateNotFound,
    BeaconStateError(BeaconStateError),
    /// The backing store could not be reached.
    Unavailable(String),
}

impl From<BeaconStateError> for StateProviderError {
    fn from(e: BeaconStateError) -> Self {
        StateProviderError::BeaconStateError(e)
    }
}

/// Supplies beacon state snapshots.
///
/// Snapshots are immutable; the service shares them between concurrent computations without
/// locking. Implementations are responsible for storage and for advancing states through empty
/// slots.
pub trait StateProvider: Send + Sync + 'static {
    /// Returns the canonical state at `slot`.
    fn state_at_slot(&self, slot: Slot) -> Result<BeaconState, StateProviderError>;

    /// Returns the state of the canonical head.
    fn head_state(&self) -> Result<BeaconState, StateProviderError>;

    /// Returns the epoch of the latest finalized checkpoint.
    fn finalized_checkpoint_epoch(&self) -> Result<Epoch, StateProviderError>;

    /// Returns the indices of validators active at `epoch` in `state`, ascending.
    fn active_validator_indices(&self, state: &BeaconState, epoch: Epoch) -> Vec<usize> {
        state.get_active_validator_indices(epoch)
    }

    /// Returns the seed of `epoch` for `domain`.
    fn seed(
        &self,
        state: &BeaconState,
        epoch: Epoch,
        domain: Domain,
        spec: &ChainSpec,
    ) -> Result<Hash256, StateProviderError> {
        Ok(state.get_seed(epoch, domain, spec)?)
    }
}
