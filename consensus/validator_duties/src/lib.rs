//! Deterministic validator duty computation: committees, proposers, lifecycle states and the
//! churn-limited activation and exit queues.
//!
//! Everything in this crate is synchronous and side-effect free apart from the engine-owned
//! caches. Callers provide the active set and seed for an epoch, typically from a `BeaconState`.

pub mod beacon_proposer_cache;
pub mod churn;
pub mod committee_cache;
pub mod committee_engine;
pub mod duties;
mod errors;
mod metrics;
pub mod proposer_duties;
pub mod shuffle;
pub mod shuffling_cache;
pub mod validator_queue;
pub mod validator_status;

pub use crate::churn::{churn_strategy, ChurnStrategy};
pub use crate::committee_cache::{AttestationDuty, CommitteeAssignment, CommitteeCache};
pub use crate::committee_engine::CommitteeAssignmentEngine;
pub use crate::duties::{HasCommitteeIndex, HasSlot, ProposerAssignment};
pub use crate::errors::Error;
pub use crate::proposer_duties::{EpochProposers, ProposerDutyComputer};
pub use crate::shuffle::{Shuffle, SwapOrNotShuffle};
pub use crate::validator_queue::{compute_queues, ActivationProjection, ChurnQueues};
pub use crate::validator_status::{classify, lifecycle_status, LifecycleStatus, ValidatorStatus};
