use crate::errors::ApiError;
use types::{ChainSpec, Epoch, Slot};

/// Selects the epoch a list request is evaluated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EpochQuery {
    Genesis,
    Epoch(Epoch),
    /// The epoch containing the slot.
    Slot(Slot),
    /// The current wall-clock epoch.
    #[default]
    Current,
}

impl EpochQuery {
    /// Returns the epoch selected by `self`.
    ///
    /// Epochs after `current_epoch` are rejected rather than clamped.
    pub fn resolve(self, current_epoch: Epoch, spec: &ChainSpec) -> Result<Epoch, ApiError> {
        let epoch = match self {
            EpochQuery::Genesis => spec.genesis_slot.epoch(spec.slots_per_epoch),
            EpochQuery::Epoch(epoch) => epoch,
            EpochQuery::Slot(slot) => slot.epoch(spec.slots_per_epoch),
            EpochQuery::Current => current_epoch,
        };

        if epoch > current_epoch {
            return Err(ApiError::invalid_request(format!(
                "cannot retrieve information about an epoch in the future, current epoch {}, \
                 requesting {}",
                current_epoch, epoch
            )));
        }

        Ok(epoch)
    }
}
