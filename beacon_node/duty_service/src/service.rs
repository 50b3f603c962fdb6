use crate::config::Config;
use crate::errors::{ApiError, DutyError};
use crate::events::EventFeed;
use crate::state_provider::StateProvider;
use slog::{debug, Logger};
use slot_clock::SlotClock;
use std::marker::PhantomData;
use std::sync::Arc;
use task_executor::TaskExecutor;
use types::{BeaconState, ChainSpec, Domain, Epoch, Slot};
use validator_duties::{
    CommitteeAssignmentEngine, CommitteeCache, EpochProposers, ProposerDutyComputer, Shuffle,
};

/// The collaborators a `DutyService` is generic over.
pub trait DutyServiceTypes: Send + Sync + 'static {
    type StateProvider: StateProvider;
    type SlotClock: SlotClock;
    type Shuffle: Shuffle + Clone + 'static;
}

/// Zero-sized carrier used to instantiate `DutyServiceTypes` from concrete types.
pub struct Witness<TStateProvider, TSlotClock, TShuffle>(
    PhantomData<(TStateProvider, TSlotClock, TShuffle)>,
);

impl<TStateProvider, TSlotClock, TShuffle> DutyServiceTypes
    for Witness<TStateProvider, TSlotClock, TShuffle>
where
    TStateProvider: StateProvider,
    TSlotClock: SlotClock + 'static,
    TShuffle: Shuffle + Clone + 'static,
{
    type StateProvider = TStateProvider;
    type SlotClock = TSlotClock;
    type Shuffle = TShuffle;
}

/// Serves validator duties and lifecycle information computed from the states of a
/// `StateProvider`.
///
/// The service is shared between connections. Per-connection state lives in the streams it
/// spawns; the only state shared across connections are the memoized shufflings and proposers.
pub struct DutyService<T: DutyServiceTypes> {
    pub(crate) state_provider: Arc<T::StateProvider>,
    pub(crate) slot_clock: T::SlotClock,
    pub(crate) committee_engine: CommitteeAssignmentEngine<T::Shuffle>,
    pub(crate) proposer_computer: ProposerDutyComputer<T::Shuffle>,
    pub(crate) event_feed: Arc<EventFeed>,
    pub(crate) spec: Arc<ChainSpec>,
    pub(crate) config: Config,
    pub(crate) executor: TaskExecutor,
    pub(crate) log: Logger,
}

/// The inputs shared by every duty computation for one epoch.
pub(crate) struct EpochContext {
    pub epoch: Epoch,
    pub state: BeaconState,
    pub active_indices: Vec<usize>,
}

impl<T: DutyServiceTypes> DutyService<T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state_provider: Arc<T::StateProvider>,
        slot_clock: T::SlotClock,
        shuffle: T::Shuffle,
        event_feed: Arc<EventFeed>,
        spec: Arc<ChainSpec>,
        config: Config,
        executor: TaskExecutor,
        log: Logger,
    ) -> Self {
        let committee_engine = CommitteeAssignmentEngine::new(
            shuffle.clone(),
            config.shuffling_cache_size,
            spec.clone(),
            log.clone(),
        );
        let proposer_computer = ProposerDutyComputer::new(
            shuffle,
            config.proposer_cache_size,
            spec.clone(),
            log.clone(),
        );

        debug!(
            log,
            "Duty service started";
            "shuffling_cache_size" => config.shuffling_cache_size,
            "proposer_cache_size" => config.proposer_cache_size,
        );

        Self {
            state_provider,
            slot_clock,
            committee_engine,
            proposer_computer,
            event_feed,
            spec,
            config,
            executor,
            log,
        }
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn event_feed(&self) -> &Arc<EventFeed> {
        &self.event_feed
    }

    pub fn slot_clock(&self) -> &T::SlotClock {
        &self.slot_clock
    }

    /// The wall-clock slot. Prior to genesis this is the genesis slot.
    pub fn current_slot(&self) -> Result<Slot, ApiError> {
        self.slot_clock
            .now_or_genesis()
            .ok_or_else(|| ApiError::Unavailable("unable to read the slot clock".to_string()))
    }

    /// The wall-clock epoch.
    pub fn current_epoch(&self) -> Result<Epoch, ApiError> {
        Ok(self.current_slot()?.epoch(self.spec.slots_per_epoch))
    }

    /// Forget every memoized shuffling and proposer set from `epoch` onwards.
    pub fn invalidate_caches_from(&self, epoch: Epoch) {
        self.committee_engine.invalidate_from(epoch);
        self.proposer_computer.invalidate_from(epoch);
    }

    /// Load the state duties of `epoch` are computed from.
    ///
    /// Past epochs use the state at their first slot. The current and next epoch use the state at
    /// the wall-clock slot, since no later state exists yet.
    pub(crate) fn epoch_context(&self, epoch: Epoch) -> Result<EpochContext, DutyError> {
        let start_slot = epoch.start_slot(self.spec.slots_per_epoch);
        let slot = std::cmp::min(start_slot, self.current_slot()?);
        let state = self.state_provider.state_at_slot(slot)?;
        let active_indices = self.state_provider.active_validator_indices(&state, epoch);

        Ok(EpochContext {
            epoch,
            state,
            active_indices,
        })
    }

    /// The committee shuffling of the context's epoch.
    pub(crate) fn committee_cache(
        &self,
        ctx: &EpochContext,
    ) -> Result<Arc<CommitteeCache>, DutyError> {
        let seed = self.state_provider.seed(
            &ctx.state,
            ctx.epoch,
            Domain::BeaconAttester,
            &self.spec,
        )?;
        Ok(self
            .committee_engine
            .committee_cache(ctx.epoch, ctx.active_indices.clone(), seed)?)
    }

    /// The proposers of the context's epoch.
    pub(crate) fn epoch_proposers(
        &self,
        ctx: &EpochContext,
    ) -> Result<Arc<EpochProposers>, DutyError> {
        let seed = self.state_provider.seed(
            &ctx.state,
            ctx.epoch,
            Domain::BeaconProposer,
            &self.spec,
        )?;
        Ok(self.proposer_computer.compute_proposers(
            ctx.epoch,
            &ctx.active_indices,
            seed,
            ctx.state.validators(),
        )?)
    }
}
