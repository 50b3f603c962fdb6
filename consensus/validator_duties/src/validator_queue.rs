//! Activation and exit queues, and the forward projection of activation epochs.

use crate::churn::churn_strategy;
use crate::metrics;
use crate::validator_status::{classify, ValidatorStatus};
use std::collections::{BTreeMap, HashSet};
use types::{ChainSpec, Epoch, ForkName, Validator};

/// The queues of a registry snapshot. Both queues hold validator indices.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChurnQueues {
    /// The activation churn limit of the snapshot's epoch.
    pub churn_limit: u64,
    /// Ordered by `(activation_eligibility_epoch, index)`.
    pub activation_queue: Vec<usize>,
    /// Ordered by `(withdrawable_epoch, index)`.
    pub exit_queue: Vec<usize>,
    /// The epoch newly initiated exits would be assigned.
    pub exit_queue_epoch: Epoch,
}

/// Compute the activation and exit queues of `validators`.
///
/// `current_epoch` is the epoch of the snapshot the registry was taken from and `fork` the
/// protocol version in effect there; `active_validator_count` is the number of validators active
/// at `current_epoch`.
pub fn compute_queues(
    validators: &[Validator],
    finalized_epoch: Epoch,
    current_epoch: Epoch,
    active_validator_count: u64,
    fork: ForkName,
    spec: &ChainSpec,
) -> ChurnQueues {
    let strategy = churn_strategy(fork);
    let churn_limit = strategy.activation_churn_limit(active_validator_count, spec);
    let exit_churn_limit = strategy.exit_churn_limit(active_validator_count, spec);

    // Validators whose activation has not been committed to by finality yet.
    let activation_floor = spec.compute_activation_exit_epoch(finalized_epoch);
    let mut activation_queue = validators
        .iter()
        .enumerate()
        .filter(|(_, v)| {
            v.activation_eligibility_epoch != spec.far_future_epoch
                && v.activation_epoch >= activation_floor
        })
        .map(|(i, v)| (v.activation_eligibility_epoch, i))
        .collect::<Vec<_>>();
    activation_queue.sort_unstable();

    let exiting = validators
        .iter()
        .enumerate()
        .filter(|(_, v)| v.has_initiated_exit(spec))
        .collect::<Vec<_>>();

    let mut exit_queue_epoch = exiting
        .iter()
        .map(|(_, v)| v.exit_epoch)
        .max()
        .unwrap_or_else(|| Epoch::new(0));
    let exit_queue_churn = exiting
        .iter()
        .filter(|(_, v)| v.exit_epoch == exit_queue_epoch)
        .count() as u64;
    if exit_queue_churn >= exit_churn_limit {
        exit_queue_epoch += 1;
    }

    let withdrawable_bound = exit_queue_epoch + spec.min_validator_withdrawability_delay;
    let mut exit_queue = exiting
        .into_iter()
        .filter(|(_, v)| {
            v.withdrawable_epoch < withdrawable_bound
                && classify(Some(v), current_epoch, spec) != ValidatorStatus::Exited
        })
        .map(|(i, v)| (v.withdrawable_epoch, i))
        .collect::<Vec<_>>();
    exit_queue.sort_unstable();

    ChurnQueues {
        churn_limit,
        activation_queue: activation_queue.into_iter().map(|(_, i)| i).collect(),
        exit_queue: exit_queue.into_iter().map(|(_, i)| i).collect(),
        exit_queue_epoch,
    }
}

/// Returns the 1-based position of `validator_index` in `activation_queue`, if present.
pub fn position_in_activation_queue(
    activation_queue: &[usize],
    validator_index: usize,
) -> Option<u64> {
    activation_queue
        .iter()
        .position(|i| *i == validator_index)
        .map(|p| p as u64 + 1)
}

/// Projected activation epochs for validators that are queued but have no activation epoch yet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActivationProjection {
    activation_epochs: BTreeMap<usize, Epoch>,
    simulated_epochs: u64,
}

impl ActivationProjection {
    /// Simulate churn-limited activation starting at `current_epoch + 1` until every validator in
    /// `targets` has been dequeued or the queue is empty.
    ///
    /// Each simulated epoch dequeues `churn(num_active)` candidates from the front of the queue
    /// and each dequeued candidate increases `num_active`. A candidate dequeued in epoch `e` is
    /// projected to activate at `compute_activation_exit_epoch(e)`.
    pub fn simulate(
        validators: &[Validator],
        targets: &HashSet<usize>,
        current_epoch: Epoch,
        fork: ForkName,
        spec: &ChainSpec,
    ) -> Self {
        let mut candidates = validators
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_awaiting_activation(spec))
            .map(|(i, v)| (v.activation_eligibility_epoch, i))
            .collect::<Vec<_>>();
        candidates.sort_unstable();

        let strategy = churn_strategy(fork);
        let mut num_active = validators
            .iter()
            .filter(|v| v.is_active_at(current_epoch))
            .count() as u64;

        let mut remaining = targets
            .iter()
            .filter(|i| validators.get(**i).is_some_and(|v| v.is_awaiting_activation(spec)))
            .count();

        let mut projection = Self::default();
        let mut queue = candidates.into_iter().map(|(_, i)| i).peekable();
        let mut epoch = current_epoch + 1;

        while remaining > 0 && queue.peek().is_some() {
            // A zero limit would never drain the queue.
            let churn = strategy.activation_churn_limit(num_active, spec).max(1);
            let activation_epoch = spec.compute_activation_exit_epoch(epoch);

            for index in queue.by_ref().take(churn as usize) {
                if targets.contains(&index) {
                    projection.activation_epochs.insert(index, activation_epoch);
                    remaining = remaining.saturating_sub(1);
                }
                num_active = num_active.saturating_add(1);
            }

            projection.simulated_epochs = projection.simulated_epochs.saturating_add(1);
            epoch += 1;
        }

        metrics::observe(
            &metrics::ACTIVATION_SIMULATION_EPOCHS,
            projection.simulated_epochs as f64,
        );

        projection
    }

    pub fn activation_epoch(&self, validator_index: usize) -> Option<Epoch> {
        self.activation_epochs.get(&validator_index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Epoch)> + '_ {
        self.activation_epochs.iter().map(|(i, e)| (*i, *e))
    }

    pub fn simulated_epochs(&self) -> u64 {
        self.simulated_epochs
    }
}
