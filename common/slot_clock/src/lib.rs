//! Wall-clock slots and epochs.
//!
//! The duty service answers "current epoch" questions from a `SlotClock` rather than from the
//! head state, so that a stalled chain never makes future epochs look current.
mod manual_slot_clock;
mod system_time_slot_clock;

use std::time::Duration;

pub use crate::manual_slot_clock::ManualSlotClock;
pub use crate::system_time_slot_clock::SystemTimeSlotClock;
pub use types::{Epoch, Slot};

/// A clock that reports the current slot.
///
/// The clock is not required to be monotonically increasing and may go backwards.
pub trait SlotClock: Send + Sync + Sized + Clone {
    /// Creates a new slot clock where the first slot is `genesis_slot`, genesis occurred
    /// `genesis_duration` after the `UNIX_EPOCH` and each slot is `slot_duration` apart.
    fn new(genesis_slot: Slot, genesis_duration: Duration, slot_duration: Duration) -> Self;

    /// Returns the slot at this present time, or `None` prior to genesis.
    fn now(&self) -> Option<Slot>;

    /// Indicates if the current time is prior to genesis time.
    ///
    /// Returns `None` if the system clock cannot be read.
    fn is_prior_to_genesis(&self) -> Option<bool>;

    /// Returns the present time as a duration since the UNIX epoch.
    fn now_duration(&self) -> Option<Duration>;

    /// Returns the slot of the given duration since the UNIX epoch.
    fn slot_of(&self, now: Duration) -> Option<Slot>;

    fn slot_duration(&self) -> Duration;

    /// Returns the start time of the slot, as a duration since `UNIX_EPOCH`.
    fn start_of(&self, slot: Slot) -> Option<Duration>;

    /// Returns the first slot to be returned at the genesis time.
    fn genesis_slot(&self) -> Slot;

    /// Returns the `Duration` from `UNIX_EPOCH` to the genesis time.
    fn genesis_duration(&self) -> Duration;

    /// Returns the slot at this present time if genesis has happened. Otherwise, returns the
    /// genesis slot. Returns `None` if there is an error reading the clock.
    fn now_or_genesis(&self) -> Option<Slot> {
        if self.is_prior_to_genesis()? {
            Some(self.genesis_slot())
        } else {
            self.now()
        }
    }

    /// Returns the epoch at this present time, or the genesis epoch before genesis.
    fn current_epoch(&self, slots_per_epoch: u64) -> Option<Epoch> {
        self.now_or_genesis().map(|slot| slot.epoch(slots_per_epoch))
    }

    /// Returns the duration from now until `slot`, or `None` if it has already started.
    fn duration_to_slot(&self, slot: Slot) -> Option<Duration> {
        self.start_of(slot)?.checked_sub(self.now_duration()?)
    }

    /// Returns the duration until the first slot of the next epoch.
    fn duration_to_next_epoch(&self, slots_per_epoch: u64) -> Option<Duration> {
        let next_epoch = self.current_epoch(slots_per_epoch)? + 1;
        self.duration_to_slot(next_epoch.start_slot(slots_per_epoch))
    }

    /// Returns the start time of `epoch`, as a duration since `UNIX_EPOCH`.
    fn start_of_epoch(&self, epoch: Epoch, slots_per_epoch: u64) -> Option<Duration> {
        self.start_of(epoch.start_slot(slots_per_epoch))
    }
}
