use crate::errors::ApiError;
use crate::metrics;
use crate::state_provider::StateProvider;
use crate::service::{DutyService, DutyServiceTypes};
use serde::{Deserialize, Serialize};
use types::{BeaconState, Epoch, PublicKeyBytes};
use validator_duties::{compute_queues, ChurnQueues};

/// The activation and exit queues at the head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorQueue {
    #[serde(with = "serde_utils::quoted_u64")]
    pub churn_limit: u64,
    pub activation_public_keys: Vec<PublicKeyBytes>,
    pub exit_public_keys: Vec<PublicKeyBytes>,
    pub activation_validator_indices: Vec<usize>,
    pub exit_validator_indices: Vec<usize>,
}

impl<T: DutyServiceTypes> DutyService<T> {
    /// Returns the activation and exit queues of the head state.
    pub fn get_validator_queue(&self) -> Result<ValidatorQueue, ApiError> {
        metrics::inc_counter_vec(&metrics::REQUESTS_TOTAL, &["get_validator_queue"]);
        let _timer = metrics::start_timer_vec(&metrics::REQUEST_TIMES, &["get_validator_queue"]);

        let head = self.state_provider.head_state()?;
        let queues = self.churn_queues(&head)?;

        let public_keys = |indices: &[usize]| -> Result<Vec<PublicKeyBytes>, ApiError> {
            indices
                .iter()
                .map(|i| Ok(head.get_validator(*i)?.pubkey))
                .collect()
        };

        Ok(ValidatorQueue {
            churn_limit: queues.churn_limit,
            activation_public_keys: public_keys(&queues.activation_queue)?,
            exit_public_keys: public_keys(&queues.exit_queue)?,
            activation_validator_indices: queues.activation_queue,
            exit_validator_indices: queues.exit_queue,
        })
    }

    /// The queues of `state`, relative to the latest finalized checkpoint.
    pub(crate) fn churn_queues(&self, state: &BeaconState) -> Result<ChurnQueues, ApiError> {
        let finalized_epoch: Epoch = self.state_provider.finalized_checkpoint_epoch()?;
        let current_epoch = state.current_epoch(&self.spec);
        let active_validator_count = state.get_active_validator_count(current_epoch) as u64;

        Ok(compute_queues(
            state.validators(),
            finalized_epoch,
            current_epoch,
            active_validator_count,
            state.fork_name(&self.spec),
            &self.spec,
        ))
    }
}
