use crate::errors::ApiError;
use crate::metrics;
use crate::state_provider::StateProvider;
use crate::service::{DutyService, DutyServiceTypes};
use serde::{Deserialize, Serialize};
use serde_utils::quoted_u64::Quoted;
use types::{Epoch, PublicKeyBytes};
use validator_duties::validator_queue::position_in_activation_queue;
use validator_duties::{classify, ValidatorStatus};

/// Identifies a validator either by its public key or by its registry index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorId {
    PublicKey(PublicKeyBytes),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorStatusResponse {
    pub public_key: PublicKeyBytes,
    /// `None` for a public key that is not in the registry.
    pub index: Option<usize>,
    pub status: ValidatorStatus,
    /// `FAR_FUTURE_EPOCH` for unknown validators.
    pub activation_epoch: Epoch,
    /// 1-based position in the activation queue, for validators still waiting to be activated.
    pub position_in_activation_queue: Option<Quoted<u64>>,
}

impl<T: DutyServiceTypes> DutyService<T> {
    /// Returns the lifecycle status of each distinct validator in `ids` at the head.
    ///
    /// Public keys that are not in the registry report `Unknown`. Indices beyond the registry are
    /// rejected.
    pub fn validator_status(
        &self,
        ids: &[ValidatorId],
    ) -> Result<Vec<ValidatorStatusResponse>, ApiError> {
        metrics::inc_counter_vec(&metrics::REQUESTS_TOTAL, &["validator_status"]);
        let _timer = metrics::start_timer_vec(&metrics::REQUEST_TIMES, &["validator_status"]);

        if ids.is_empty() {
            return Err(ApiError::invalid_request(
                "must provide at least one public key or index",
            ));
        }

        let head = self.state_provider.head_state()?;
        let epoch = head.current_epoch(&self.spec);
        let registry_len = head.validators().len();

        // Resolve every id to `(public key, index)` and drop duplicates, keeping the first
        // occurrence.
        let mut resolved: Vec<(PublicKeyBytes, Option<usize>)> = Vec::with_capacity(ids.len());
        for id in ids {
            let entry = match id {
                ValidatorId::PublicKey(public_key) => {
                    (*public_key, head.get_validator_index(public_key))
                }
                ValidatorId::Index(index) => {
                    let validator = head.validators().get(*index).ok_or_else(|| {
                        ApiError::invalid_request(format!(
                            "validator index {} is beyond the registry of {} validators",
                            index, registry_len
                        ))
                    })?;
                    (validator.pubkey, Some(*index))
                }
            };
            if !resolved.contains(&entry) {
                resolved.push(entry);
            }
        }

        let needs_queue = resolved.iter().any(|(_, index)| {
            index
                .and_then(|i| head.validators().get(i))
                .is_some_and(|v| classify(Some(v), epoch, &self.spec).is_queued_for_activation())
        });
        let activation_queue = if needs_queue {
            self.churn_queues(&head)?.activation_queue
        } else {
            vec![]
        };

        Ok(resolved
            .into_iter()
            .map(|(public_key, index)| {
                let validator = index.and_then(|i| head.validators().get(i));
                let status = classify(validator, epoch, &self.spec);
                let position = index
                    .filter(|_| status.is_queued_for_activation())
                    .and_then(|i| position_in_activation_queue(&activation_queue, i));

                ValidatorStatusResponse {
                    public_key,
                    index,
                    status,
                    activation_epoch: validator
                        .map_or(self.spec.far_future_epoch, |v| v.activation_epoch),
                    position_in_activation_queue: position.map(|value| Quoted { value }),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::test_utils::deterministic_pubkey;

    #[test]
    fn queue_position_is_quoted() {
        let response = ValidatorStatusResponse {
            public_key: deterministic_pubkey(3),
            index: Some(3),
            status: ValidatorStatus::Pending,
            activation_epoch: Epoch::max_value(),
            position_in_activation_queue: Some(Quoted { value: 7 }),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["position_in_activation_queue"], "7");
        assert_eq!(json["activation_epoch"], u64::MAX.to_string());
        assert_eq!(
            serde_json::from_value::<ValidatorStatusResponse>(json).unwrap(),
            response
        );
    }
}
