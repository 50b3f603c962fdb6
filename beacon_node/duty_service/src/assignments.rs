//! `ListAssignments` and `ListCommittees`.

use crate::errors::ApiError;
use crate::metrics;
use crate::query_filter::EpochQuery;
use crate::service::{DutyService, DutyServiceTypes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use types::{BeaconState, Epoch, PublicKeyBytes, Slot};
use validator_duties::duties::sort_by_committee;
use validator_duties::{CommitteeAssignment, HasSlot, ProposerAssignment};

/// Restricts `ListAssignments` to a set of validators. An empty filter selects every validator
/// active in the requested epoch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentFilter {
    pub indices: Vec<usize>,
    pub public_keys: Vec<PublicKeyBytes>,
}

impl AssignmentFilter {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty() && self.public_keys.is_empty()
    }

    /// Returns the selected indices, public keys first, without duplicates.
    fn resolve(&self, state: &BeaconState) -> Result<Vec<usize>, ApiError> {
        let mut selected = Vec::with_capacity(self.indices.len() + self.public_keys.len());

        for public_key in &self.public_keys {
            let index = state.get_validator_index(public_key).ok_or_else(|| {
                ApiError::not_found(format!("unknown public key {}", public_key))
            })?;
            if !selected.contains(&index) {
                selected.push(index);
            }
        }

        let registry_len = state.validators().len();
        for index in &self.indices {
            if *index >= registry_len {
                return Err(ApiError::invalid_request(format!(
                    "validator index {} is beyond the registry of {} validators",
                    index, registry_len
                )));
            }
            if !selected.contains(index) {
                selected.push(*index);
            }
        }

        Ok(selected)
    }
}

/// The duties of one validator in one epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorAssignment {
    pub public_key: PublicKeyBytes,
    pub validator_index: usize,
    /// The committee the validator attests in, if it is active in the epoch.
    pub committee: Option<CommitteeAssignment>,
    pub proposals: Vec<ProposerAssignment>,
}

impl ValidatorAssignment {
    pub fn proposer_slots(&self) -> Vec<Slot> {
        self.proposals.iter().map(HasSlot::slot).collect()
    }
}

/// Every committee of an epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconCommittees {
    pub epoch: Epoch,
    pub active_validator_count: usize,
    pub committees: BTreeMap<Slot, Vec<CommitteeAssignment>>,
}

impl BeaconCommittees {
    /// All committees ordered by `(slot, committee_index)`.
    pub fn flattened(&self) -> Vec<CommitteeAssignment> {
        let mut committees = self.committees.values().flatten().cloned().collect::<Vec<_>>();
        sort_by_committee(&mut committees);
        committees
    }
}

impl<T: DutyServiceTypes> DutyService<T> {
    /// Returns the committee and proposer assignments of the validators selected by `filter` in
    /// the epoch selected by `query`.
    pub fn list_assignments(
        &self,
        query: EpochQuery,
        filter: &AssignmentFilter,
    ) -> Result<Vec<ValidatorAssignment>, ApiError> {
        metrics::inc_counter_vec(&metrics::REQUESTS_TOTAL, &["list_assignments"]);
        let _timer = metrics::start_timer_vec(&metrics::REQUEST_TIMES, &["list_assignments"]);

        let epoch = query.resolve(self.current_epoch()?, &self.spec)?;
        let ctx = self.epoch_context(epoch)?;

        let indices = if filter.is_empty() {
            ctx.active_indices.clone()
        } else {
            filter.resolve(&ctx.state)?
        };

        let committee_cache = self.committee_cache(&ctx)?;
        let proposers = self.epoch_proposers(&ctx)?;

        indices
            .into_iter()
            .map(|validator_index| {
                let validator = ctx.state.get_validator(validator_index)?;

                let committee = committee_cache
                    .get_attestation_duties(validator_index)
                    .and_then(|duty| {
                        committee_cache
                            .get_beacon_committee(duty.slot, duty.committee_index)
                            .map(|members| CommitteeAssignment {
                                epoch,
                                slot: duty.slot,
                                committee_index: duty.committee_index,
                                members: members.to_vec(),
                            })
                    });

                let proposals = proposers
                    .slots_for(validator_index)
                    .iter()
                    .map(|slot| ProposerAssignment {
                        epoch,
                        slot: *slot,
                        validator_index,
                    })
                    .collect();

                Ok::<_, ApiError>(ValidatorAssignment {
                    public_key: validator.pubkey,
                    validator_index,
                    committee,
                    proposals,
                })
            })
            .collect()
    }

    /// Returns every committee of the epoch selected by `query`.
    pub fn list_committees(&self, query: EpochQuery) -> Result<BeaconCommittees, ApiError> {
        metrics::inc_counter_vec(&metrics::REQUESTS_TOTAL, &["list_committees"]);
        let _timer = metrics::start_timer_vec(&metrics::REQUEST_TIMES, &["list_committees"]);

        let epoch = query.resolve(self.current_epoch()?, &self.spec)?;
        let ctx = self.epoch_context(epoch)?;
        let committee_cache = self.committee_cache(&ctx)?;

        Ok(BeaconCommittees {
            epoch,
            active_validator_count: committee_cache.active_validator_count(),
            committees: committee_cache.committees_by_slot()?,
        })
    }
}
