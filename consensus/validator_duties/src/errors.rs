use safe_arith::ArithError;
use types::{BeaconStateError, Epoch, Slot};

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    /// There are no active validators at `epoch`, so no committees or proposers exist.
    EmptyActiveSet { epoch: Epoch },
    ZeroSlotsPerEpoch,
    /// The shuffling primitive rejected its input (e.g., the list is too large).
    ShuffleFailed { slot: Slot },
    /// A committee range fell outside the shuffling. The cached shuffling is malformed.
    CommitteeOutOfBounds { slot: Slot, committee_index: u64 },
    /// The number of proposers computed for an epoch did not match the number of slots.
    ProposerCountMismatch {
        epoch: Epoch,
        expected: usize,
        found: usize,
    },
    /// No candidate was accepted within the iteration bound.
    ProposerSelectionFailed { slot: Slot },
    /// An active or shuffled index is not in the registry the computation was given.
    UnknownValidator(usize),
    BeaconStateError(BeaconStateError),
    ArithError(ArithError),
}

impl Error {
    /// Returns `true` if the error indicates that the state the computation was run against (or
    /// a cache derived from it) cannot be trusted, rather than a problem with a single request.
    ///
    /// `ProposerCountMismatch` and `CommitteeOutOfBounds` cannot arise from a consistent
    /// snapshot. `UnknownValidator` arises when a snapshot's active set names a validator its
    /// registry does not contain.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::ProposerCountMismatch { .. }
                | Error::CommitteeOutOfBounds { .. }
                | Error::UnknownValidator(_)
        )
    }
}

impl From<ArithError> for Error {
    fn from(e: ArithError) -> Error {
        Error::ArithError(e)
    }
}

impl From<BeaconStateError> for Error {
    fn from(e: BeaconStateError) -> Error {
        Error::BeaconStateError(e)
    }
}
