use crate::errors::ApiError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use types::PublicKeyBytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Add,
    Remove,
    Set,
}

/// A client-initiated update of the keys watched by a validator-info stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorChangeSet {
    pub action: ChangeAction,
    pub public_keys: Vec<PublicKeyBytes>,
}

impl ValidatorChangeSet {
    pub fn add(public_keys: Vec<PublicKeyBytes>) -> Self {
        Self {
            action: ChangeAction::Add,
            public_keys,
        }
    }

    pub fn remove(public_keys: Vec<PublicKeyBytes>) -> Self {
        Self {
            action: ChangeAction::Remove,
            public_keys,
        }
    }

    pub fn set(public_keys: Vec<PublicKeyBytes>) -> Self {
        Self {
            action: ChangeAction::Set,
            public_keys,
        }
    }
}

/// The set of public keys watched by one connection.
///
/// Writers replace the set wholesale under the lock. Readers take a snapshot (`Arc` clone) and
/// compute against it without holding the lock, so a slow computation never blocks an update
/// and never observes a half-applied one.
#[derive(Debug)]
pub struct SubscriptionState {
    keys: RwLock<Arc<Vec<PublicKeyBytes>>>,
    max_keys: usize,
}

impl SubscriptionState {
    pub fn new(max_keys: usize) -> Self {
        Self {
            keys: RwLock::new(Arc::new(vec![])),
            max_keys,
        }
    }

    /// The keys currently watched, in the order they were first added.
    pub fn snapshot(&self) -> Arc<Vec<PublicKeyBytes>> {
        self.keys.read().clone()
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    /// Apply `change` and return the keys that became watched because of it.
    ///
    /// Empty (all-zero) keys are ignored. A change that would grow the set beyond the limit is
    /// rejected and leaves the set unchanged.
    pub fn apply(&self, change: &ValidatorChangeSet) -> Result<Vec<PublicKeyBytes>, ApiError> {
        let mut keys = self.keys.write();

        let (next, added) = match change.action {
            ChangeAction::Add => {
                let mut next = keys.to_vec();
                let mut added = vec![];
                for key in change.public_keys.iter().filter(|k| !k.is_empty()) {
                    if !next.contains(key) {
                        next.push(*key);
                        added.push(*key);
                    }
                }
                (next, added)
            }
            ChangeAction::Remove => {
                let next: Vec<_> = keys
                    .iter()
                    .filter(|k| !change.public_keys.contains(*k))
                    .copied()
                    .collect();
                (next, vec![])
            }
            ChangeAction::Set => {
                let mut next = Vec::with_capacity(change.public_keys.len());
                for key in change.public_keys.iter().filter(|k| !k.is_empty()) {
                    if !next.contains(key) {
                        next.push(*key);
                    }
                }
                let added = next.clone();
                (next, added)
            }
        };

        if next.len() > self.max_keys {
            return Err(ApiError::invalid_request(format!(
                "cannot watch {} keys, the limit is {}",
                next.len(),
                self.max_keys
            )));
        }

        *keys = Arc::new(next);
        Ok(added)
    }
}
