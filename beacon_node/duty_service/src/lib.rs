//! Serves validator duties to validator clients.
//!
//! The `DutyService` answers one-shot queries (assignments, committees, lifecycle status and the
//! activation and exit queues) from a `StateProvider`, and drives two kinds of long-lived streams
//! from the chain events published on its `EventFeed`:
//!
//! - `DutyStream`: one `DutySnapshot` of proposer duties per epoch, backfilled from a start epoch
//!   and then tailed live, with recomputed snapshots pushed after a reorg.
//! - `ValidatorInfoStream`: lifecycle records for a client-managed set of public keys, pushed
//!   when keys are added and at every epoch boundary.
pub mod assignments;
pub mod config;
pub mod connection;
pub mod duty_stream;
pub mod errors;
pub mod events;
mod metrics;
pub mod query_filter;
pub mod service;
pub mod state_provider;
pub mod subscription;
pub mod test_utils;
pub mod validator_info_stream;
pub mod validator_queue;
pub mod validator_status;

pub use self::assignments::{AssignmentFilter, BeaconCommittees, ValidatorAssignment};
pub use self::config::Config;
pub use self::connection::{connection_context, ConnectionCanceller, ConnectionContext};
pub use self::duty_stream::{DutySnapshot, DutyStream};
pub use self::errors::{ApiError, CancelReason, DutyError};
pub use self::events::{EpochBoundary, EventFeed, EventKind, ReorgInfo};
pub use self::query_filter::EpochQuery;
pub use self::service::{DutyService, DutyServiceTypes, Witness};
pub use self::state_provider::{StateProvider, StateProviderError};
pub use self::subscription::{ChangeAction, SubscriptionState, ValidatorChangeSet};
pub use self::validator_info_stream::{ValidatorInfo, ValidatorInfoStream};
pub use self::validator_queue::ValidatorQueue;
pub use self::validator_status::{ValidatorId, ValidatorStatusResponse};
pub use validator_duties::{
    CommitteeAssignment, LifecycleStatus, ProposerAssignment, ValidatorStatus,
};
