//! Ethereum consensus types used by the validator duty service.

#[macro_use]
mod slot_epoch_macros;

pub mod beacon_state;
pub mod chain_spec;
pub mod checkpoint;
pub mod fork_name;
pub mod public_key_bytes;
pub mod slot_epoch;
pub mod test_utils;
pub mod validator;

pub use crate::beacon_state::{BeaconState, Error as BeaconStateError};
pub use crate::chain_spec::{ChainSpec, Config, Domain};
pub use crate::checkpoint::Checkpoint;
pub use crate::fork_name::ForkName;
pub use crate::public_key_bytes::PublicKeyBytes;
pub use crate::slot_epoch::{Epoch, Slot};
pub use crate::validator::Validator;
pub use safe_arith::ArithError;

pub type Hash256 = ethereum_types::H256;

/// The index of a validator in the registry.
pub type ValidatorIndex = usize;
