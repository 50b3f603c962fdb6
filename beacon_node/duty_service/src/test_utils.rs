//! In-memory collaborators for tests of this crate and its dependents.

use crate::config::Config;
use crate::events::{EpochBoundary, EventFeed, EventKind, ReorgInfo};
use crate::service::{DutyService, Witness};
use crate::state_provider::{StateProvider, StateProviderError};
use parking_lot::RwLock;
use slot_clock::{ManualSlotClock, SlotClock};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use task_executor::test_utils::TestRuntime;
use types::test_utils::{active_validator, randao_mixes};
use types::{BeaconState, ChainSpec, Epoch, Hash256, Slot, Validator};
use validator_duties::SwapOrNotShuffle;

pub type HarnessTypes = Witness<InMemoryStateProvider, ManualSlotClock, SwapOrNotShuffle>;

pub const HARNESS_GENESIS_TIME: u64 = 1_606_824_000;
pub const DEFAULT_VALIDATOR_COUNT: usize = 64;

/// A `StateProvider` backed by a map of states keyed by slot.
///
/// A lookup returns the latest stored state at or before the requested slot, advanced to that
/// slot, as if every slot in between were empty. The head is the latest stored state.
pub struct InMemoryStateProvider {
    states: RwLock<BTreeMap<Slot, BeaconState>>,
    missing: RwLock<HashSet<Slot>>,
    malformed_epochs: RwLock<HashSet<Epoch>>,
    finalized_epoch: RwLock<Epoch>,
}

impl InMemoryStateProvider {
    pub fn new(genesis_state: BeaconState) -> Self {
        let mut states = BTreeMap::new();
        states.insert(genesis_state.slot, genesis_state);
        Self {
            states: RwLock::new(states),
            missing: RwLock::new(HashSet::new()),
            malformed_epochs: RwLock::new(HashSet::new()),
            finalized_epoch: RwLock::new(Epoch::new(0)),
        }
    }

    /// Store `state` at its slot, replacing any state already there.
    pub fn insert_state(&self, state: BeaconState) {
        self.states.write().insert(state.slot, state);
    }

    /// Advance the head to `slot` without changing the registry.
    pub fn extend_head_to(&self, slot: Slot) {
        let mut states = self.states.write();
        let head = states
            .values()
            .next_back()
            .filter(|head| head.slot < slot)
            .map(|head| head.with_slot(slot));
        if let Some(head) = head {
            states.insert(slot, head);
        }
    }

    /// Drop every stored state at or after `slot`.
    pub fn truncate_from(&self, slot: Slot) {
        self.states.write().retain(|stored_slot, _| *stored_slot < slot);
    }

    /// Make lookups at exactly `slot` fail as if no state were stored.
    pub fn make_unavailable(&self, slot: Slot) {
        self.missing.write().insert(slot);
    }

    /// Report a validator outside the registry as the only active validator at `epoch`.
    pub fn make_active_set_malformed(&self, epoch: Epoch) {
        self.malformed_epochs.write().insert(epoch);
    }

    pub fn set_finalized_epoch(&self, epoch: Epoch) {
        *self.finalized_epoch.write() = epoch;
    }

    pub fn head_slot(&self) -> Option<Slot> {
        self.states.read().keys().next_back().copied()
    }
}

impl StateProvider for InMemoryStateProvider {
    fn state_at_slot(&self, slot: Slot) -> Result<BeaconState, StateProviderError> {
        if self.missing.read().contains(&slot) {
            return Err(StateProviderError::StateNotFound(slot));
        }

        self.states
            .read()
            .range(..=slot)
            .next_back()
            .map(|(stored_slot, state)| {
                if *stored_slot == slot {
                    state.clone()
                } else {
                    state.with_slot(slot)
                }
            })
            .ok_or(StateProviderError::StateNotFound(slot))
    }

    fn head_state(&self) -> Result<BeaconState, StateProviderError> {
        self.states
            .read()
            .values()
            .next_back()
            .cloned()
            .ok_or(StateProviderError::StateNotFound(Slot::new(0)))
    }

    fn finalized_checkpoint_epoch(&self) -> Result<Epoch, StateProviderError> {
        Ok(*self.finalized_epoch.read())
    }

    fn active_validator_indices(&self, state: &BeaconState, epoch: Epoch) -> Vec<usize> {
        if self.malformed_epochs.read().contains(&epoch) {
            vec![state.validators().len()]
        } else {
            state.get_active_validator_indices(epoch)
        }
    }
}

/// Builds a `DutyServiceHarness`.
pub struct DutyServiceHarnessBuilder {
    spec: ChainSpec,
    validators: Option<Vec<Validator>>,
    validator_count: usize,
    config: Config,
}

impl Default for DutyServiceHarnessBuilder {
    fn default() -> Self {
        Self {
            spec: ChainSpec::minimal(),
            validators: None,
            validator_count: DEFAULT_VALIDATOR_COUNT,
            config: Config::default(),
        }
    }
}

impl DutyServiceHarnessBuilder {
    pub fn spec(mut self, spec: ChainSpec) -> Self {
        self.spec = spec;
        self
    }

    /// Start from `validator_count` validators that are active since genesis.
    pub fn validator_count(mut self, validator_count: usize) -> Self {
        self.validator_count = validator_count;
        self
    }

    /// Start from an explicit registry.
    pub fn validators(mut self, validators: Vec<Validator>) -> Self {
        self.validators = Some(validators);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> DutyServiceHarness {
        let spec = Arc::new(self.spec);
        let validators = self.validators.unwrap_or_else(|| {
            (0..self.validator_count)
                .map(|i| active_validator(i, &spec))
                .collect()
        });
        let balances = validators.iter().map(|v| v.effective_balance).collect();

        let genesis_state = BeaconState::new(
            HARNESS_GENESIS_TIME,
            spec.genesis_slot,
            validators,
            balances,
            randao_mixes(&spec),
        )
        .expect("should build genesis state");

        let state_provider = Arc::new(InMemoryStateProvider::new(genesis_state));
        let slot_clock = ManualSlotClock::new(
            spec.genesis_slot,
            Duration::from_secs(HARNESS_GENESIS_TIME),
            Duration::from_secs(spec.seconds_per_slot),
        );

        let runtime = TestRuntime::default();
        let event_feed = Arc::new(EventFeed::new_with_capacity(
            runtime.log.clone(),
            self.config.event_channel_capacity,
        ));

        let service = Arc::new(DutyService::new(
            state_provider.clone(),
            slot_clock.clone(),
            SwapOrNotShuffle::new(spec.shuffle_round_count),
            event_feed.clone(),
            spec.clone(),
            self.config,
            runtime.task_executor.clone(),
            runtime.log.clone(),
        ));

        DutyServiceHarness {
            service,
            state_provider,
            slot_clock,
            event_feed,
            spec,
            runtime,
        }
    }
}

/// A `DutyService` over an in-memory chain with a manually driven clock.
pub struct DutyServiceHarness {
    pub service: Arc<DutyService<HarnessTypes>>,
    pub state_provider: Arc<InMemoryStateProvider>,
    pub slot_clock: ManualSlotClock,
    pub event_feed: Arc<EventFeed>,
    pub spec: Arc<ChainSpec>,
    pub runtime: TestRuntime,
}

impl DutyServiceHarness {
    pub fn builder() -> DutyServiceHarnessBuilder {
        DutyServiceHarnessBuilder::default()
    }

    pub fn slots_per_epoch(&self) -> u64 {
        self.spec.slots_per_epoch
    }

    /// Move the clock and the head to the first slot of `epoch`.
    pub fn advance_to_epoch(&self, epoch: Epoch) {
        let slot = epoch.start_slot(self.slots_per_epoch());
        self.slot_clock.set_slot(slot.as_u64());
        self.state_provider.extend_head_to(slot);
    }

    pub fn finalize(&self, epoch: Epoch) {
        self.state_provider.set_finalized_epoch(epoch);
    }

    /// Advance to `epoch` and announce its first slot on the event feed.
    pub fn epoch_boundary(&self, epoch: Epoch) {
        self.advance_to_epoch(epoch);
        self.event_feed
            .register(EventKind::EpochBoundary(EpochBoundary {
                slot: epoch.start_slot(self.slots_per_epoch()),
            }));
    }

    /// Announce a reorg that changed the chain from `epoch` onwards.
    pub fn reorg(&self, epoch: Epoch, depth: u64) -> ReorgInfo {
        let info = ReorgInfo {
            slot: epoch.start_slot(self.slots_per_epoch()),
            epoch,
            depth,
            old_head_root: Hash256::repeat_byte(0xaa),
            new_head_root: Hash256::repeat_byte(0xbb),
        };
        self.event_feed.register(EventKind::Reorg(info));
        info
    }

    /// Rewrite the chain from the first slot of `epoch` with a different registry, as a reorg
    /// onto a competing branch would.
    pub fn replace_validators_from(&self, epoch: Epoch, validators: Vec<Validator>) {
        let slot = epoch.start_slot(self.slots_per_epoch());
        let balances = validators.iter().map(|v| v.effective_balance).collect();
        let state = BeaconState::new(
            HARNESS_GENESIS_TIME,
            slot,
            validators,
            balances,
            randao_mixes(&self.spec),
        )
        .expect("should build replacement state");

        self.state_provider.truncate_from(slot);
        self.state_provider.insert_state(state);
    }
}
