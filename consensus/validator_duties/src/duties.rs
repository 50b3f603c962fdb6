//! Accessors shared by the per-slot duty types.

use crate::committee_cache::{AttestationDuty, CommitteeAssignment};
use serde::{Deserialize, Serialize};
use types::{Epoch, Slot};

/// A duty that happens at a specific slot.
pub trait HasSlot {
    fn slot(&self) -> Slot;
}

/// A duty that belongs to a specific committee of its slot.
pub trait HasCommitteeIndex: HasSlot {
    fn committee_index(&self) -> u64;
}

/// The proposer of a single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposerAssignment {
    pub epoch: Epoch,
    pub slot: Slot,
    pub validator_index: usize,
}

impl HasSlot for ProposerAssignment {
    fn slot(&self) -> Slot {
        self.slot
    }
}

impl HasSlot for CommitteeAssignment {
    fn slot(&self) -> Slot {
        self.slot
    }
}

impl HasCommitteeIndex for CommitteeAssignment {
    fn committee_index(&self) -> u64 {
        self.committee_index
    }
}

impl HasSlot for AttestationDuty {
    fn slot(&self) -> Slot {
        self.slot
    }
}

impl HasCommitteeIndex for AttestationDuty {
    fn committee_index(&self) -> u64 {
        self.committee_index
    }
}

/// Sorts duties by `(slot, committee_index)`.
pub fn sort_by_committee<T: HasCommitteeIndex>(duties: &mut [T]) {
    duties.sort_by_key(|d| (d.slot(), d.committee_index()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_by_slot_then_committee() {
        let assignment = |slot, committee_index| CommitteeAssignment {
            epoch: Epoch::new(0),
            slot: Slot::new(slot),
            committee_index,
            members: vec![],
        };
        let mut duties = vec![assignment(3, 1), assignment(2, 5), assignment(3, 0)];
        sort_by_committee(&mut duties);
        let keys = duties
            .iter()
            .map(|d| (d.slot().as_u64(), d.committee_index()))
            .collect::<Vec<_>>();
        assert_eq!(keys, vec![(2, 5), (3, 0), (3, 1)]);
    }
}
