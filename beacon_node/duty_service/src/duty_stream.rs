//! `StreamDutyInfo`: an unbounded push of per-epoch block proposer duties.
//!
//! Each connection is served by a coordinator task. It first backfills every epoch from the
//! requested start through the finalized epoch, then follows the epoch-boundary and reorg feeds.
//! Epochs are delivered in ascending order and without gaps: before an event's epoch is pushed,
//! every epoch between the last delivered one and it is filled in.
//!
//! A reorg of an epoch that has already been delivered is pushed again out of band, carrying the
//! `ReorgInfo` that caused it. It is the only snapshot that may repeat an epoch.

use crate::connection::ConnectionContext;
use crate::errors::{ApiError, CancelReason, DutyError};
use crate::events::{EpochBoundary, ReorgInfo};
use crate::metrics;
use crate::state_provider::StateProvider;
use crate::service::{DutyService, DutyServiceTypes};
use serde::{Deserialize, Serialize};
use slog::{debug, info, o, trace, warn, Logger};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use types::{Epoch, PublicKeyBytes, Slot};

/// The proposers of one epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutySnapshot {
    pub epoch: Epoch,
    #[serde(with = "serde_utils::quoted_u64")]
    pub epoch_start_timestamp: u64,
    pub proposer_pubkeys_by_slot: BTreeMap<Slot, PublicKeyBytes>,
    /// Set if the snapshot was recomputed because of a reorg.
    pub reorg: Option<ReorgInfo>,
}

/// The client end of a duty stream.
///
/// Dropping the snapshot receiver (see `into_parts`) cancels the stream.
pub struct DutyStream {
    snapshots: mpsc::Receiver<DutySnapshot>,
    outcome: oneshot::Receiver<ApiError>,
}

impl DutyStream {
    /// Returns the next snapshot, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<DutySnapshot> {
        self.snapshots.recv().await
    }

    /// Returns a snapshot if one is ready without waiting.
    pub fn try_next(&mut self) -> Option<DutySnapshot> {
        self.snapshots.try_recv().ok()
    }

    /// Waits for the stream to end and returns the reason it ended.
    pub async fn outcome(&mut self) -> ApiError {
        (&mut self.outcome)
            .await
            .unwrap_or(ApiError::Canceled(CancelReason::Service))
    }

    pub fn into_parts(self) -> (mpsc::Receiver<DutySnapshot>, oneshot::Receiver<ApiError>) {
        (self.snapshots, self.outcome)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Backfilling,
    LiveTailing,
    Closed,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Backfilling => "backfilling",
            Phase::LiveTailing => "live_tailing",
            Phase::Closed => "closed",
        }
    }
}

#[derive(Debug)]
enum Event {
    EpochBoundary(Option<Result<EpochBoundary, BroadcastStreamRecvError>>),
    Reorg(Option<Result<ReorgInfo, BroadcastStreamRecvError>>),
}

/// Waits for whichever feed is ready first, choosing at random when both are.
async fn next_event(
    boundaries: &mut BroadcastStream<EpochBoundary>,
    reorgs: &mut BroadcastStream<ReorgInfo>,
) -> Event {
    tokio::select! {
        event = reorgs.next() => Event::Reorg(event),
        event = boundaries.next() => Event::EpochBoundary(event),
    }
}

/// The serve loop of a single duty stream.
struct DutyStreamCoordinator<T: DutyServiceTypes> {
    service: Arc<DutyService<T>>,
    tx: mpsc::Sender<DutySnapshot>,
    ctx: ConnectionContext,
    exit: Pin<Box<dyn Future<Output = ()> + Send>>,
    phase: Phase,
    start_epoch: Epoch,
    /// The lowest epoch that has not been delivered yet.
    next_epoch: Epoch,
    log: Logger,
}

impl<T: DutyServiceTypes> DutyService<T> {
    /// Compute the proposer duties of `epoch`.
    pub fn duty_snapshot(
        &self,
        epoch: Epoch,
        reorg: Option<ReorgInfo>,
    ) -> Result<DutySnapshot, DutyError> {
        let _timer = metrics::start_timer(&metrics::DUTY_SNAPSHOT_TIMES);

        let ctx = self.epoch_context(epoch)?;
        let proposers = self.epoch_proposers(&ctx)?;

        let proposer_pubkeys_by_slot = proposers
            .by_slot
            .iter()
            .map(|(slot, index)| Ok((*slot, ctx.state.get_validator(*index)?.pubkey)))
            .collect::<Result<_, DutyError>>()?;

        Ok(DutySnapshot {
            epoch,
            epoch_start_timestamp: ctx.state.epoch_start_timestamp(epoch, &self.spec)?,
            proposer_pubkeys_by_slot,
            reorg,
        })
    }

    /// Open a duty stream starting at `start_epoch`, or at the finalized epoch if unset.
    ///
    /// The stream runs until `ctx` is cancelled, the service shuts down, the client drops the
    /// stream or an event feed closes.
    pub fn stream_duty_info(
        self: &Arc<Self>,
        start_epoch: Option<Epoch>,
        ctx: ConnectionContext,
    ) -> Result<DutyStream, ApiError> {
        let current_epoch = self.current_epoch()?;
        let finalized_epoch = self.state_provider.finalized_checkpoint_epoch()?;
        let start_epoch = start_epoch.unwrap_or(finalized_epoch);

        if start_epoch > current_epoch {
            return Err(ApiError::invalid_request(format!(
                "cannot stream duties from a future epoch, current epoch {}, requesting {}",
                current_epoch, start_epoch
            )));
        }

        // Subscribe before backfilling so that no event registered during the backfill is lost.
        let boundaries = BroadcastStream::new(self.event_feed.subscribe_epoch_boundary());
        let reorgs = BroadcastStream::new(self.event_feed.subscribe_reorg());

        let (tx, snapshots) = mpsc::channel(self.config.outbound_buffer.max(1));
        let (outcome_tx, outcome) = oneshot::channel();

        let coordinator = DutyStreamCoordinator {
            service: self.clone(),
            tx,
            ctx,
            exit: Box::pin(self.executor.exit()),
            phase: Phase::Backfilling,
            start_epoch,
            next_epoch: start_epoch,
            log: self.log.new(o!("stream" => "duty_info")),
        };

        info!(
            self.log,
            "Duty stream opened";
            "start_epoch" => start_epoch,
            "finalized_epoch" => finalized_epoch,
            "current_epoch" => current_epoch,
        );
        metrics::inc_gauge(&metrics::ACTIVE_DUTY_STREAMS);

        self.executor.spawn_without_exit(
            async move {
                let reason = coordinator.run(finalized_epoch, boundaries, reorgs).await;
                metrics::dec_gauge(&metrics::ACTIVE_DUTY_STREAMS);
                let _ = outcome_tx.send(reason);
            },
            "duty_stream",
        );

        Ok(DutyStream { snapshots, outcome })
    }
}

impl<T: DutyServiceTypes> DutyStreamCoordinator<T> {
    async fn run(
        mut self,
        finalized_epoch: Epoch,
        mut boundaries: BroadcastStream<EpochBoundary>,
        mut reorgs: BroadcastStream<ReorgInfo>,
    ) -> ApiError {
        let reason = match self
            .serve(finalized_epoch, &mut boundaries, &mut reorgs)
            .await
        {
            Ok(never) => match never {},
            Err(e) => e,
        };

        let last_phase = self.phase;
        self.phase = Phase::Closed;
        metrics::inc_counter_vec(&metrics::DUTY_STREAMS_CLOSED, &[close_reason(&reason)]);
        info!(
            self.log,
            "Duty stream closed";
            "reason" => %reason,
            "phase" => last_phase.as_str(),
            "next_epoch" => self.next_epoch,
        );

        reason
    }

    async fn serve(
        &mut self,
        finalized_epoch: Epoch,
        boundaries: &mut BroadcastStream<EpochBoundary>,
        reorgs: &mut BroadcastStream<ReorgInfo>,
    ) -> Result<Infallible, ApiError> {
        if self.next_epoch <= finalized_epoch {
            self.fill_through(finalized_epoch, None, "backfill").await?;
        }

        self.phase = Phase::LiveTailing;
        debug!(
            self.log,
            "Duty stream following the head";
            "phase" => self.phase.as_str(),
            "next_epoch" => self.next_epoch,
        );

        loop {
            // Cancellation is checked first so that a closed connection never triggers another
            // computation. The two event feeds are raced fairly against each other.
            let event = tokio::select! {
                biased;
                _ = self.ctx.cancelled() => {
                    return Err(ApiError::Canceled(CancelReason::Connection));
                }
                _ = &mut self.exit => {
                    return Err(ApiError::Canceled(CancelReason::Service));
                }
                _ = self.tx.closed() => {
                    return Err(ApiError::Canceled(CancelReason::Transport));
                }
                event = next_event(boundaries, reorgs) => event,
            };

            match event {
                Event::EpochBoundary(Some(Ok(boundary))) => {
                    self.on_epoch_boundary(boundary).await?;
                }
                Event::Reorg(Some(Ok(info))) => {
                    self.on_reorg(info).await?;
                }
                Event::EpochBoundary(Some(Err(BroadcastStreamRecvError::Lagged(n))))
                | Event::Reorg(Some(Err(BroadcastStreamRecvError::Lagged(n)))) => {
                    // The next event fills every epoch that was missed.
                    metrics::inc_counter(&metrics::EVENT_FEED_LAGGED);
                    warn!(
                        self.log,
                        "Duty stream fell behind the event feed";
                        "missed_events" => n,
                        "next_epoch" => self.next_epoch,
                    );
                }
                Event::EpochBoundary(None) => {
                    return Err(ApiError::Aborted(
                        "epoch boundary subscription closed".to_string(),
                    ));
                }
                Event::Reorg(None) => {
                    return Err(ApiError::Aborted("reorg subscription closed".to_string()));
                }
            }
        }
    }

    /// Push the duties of the epoch after the boundary, filling any gap before it.
    async fn on_epoch_boundary(&mut self, boundary: EpochBoundary) -> Result<(), ApiError> {
        let epoch = boundary.slot.epoch(self.service.spec.slots_per_epoch);
        let lookahead_epoch = epoch + 1;

        if lookahead_epoch < self.next_epoch {
            trace!(
                self.log,
                "Ignoring epoch boundary already delivered";
                "epoch" => epoch,
                "next_epoch" => self.next_epoch,
            );
            return Ok(());
        }

        self.fill_through(lookahead_epoch, None, "epoch_boundary").await
    }

    async fn on_reorg(&mut self, info: ReorgInfo) -> Result<(), ApiError> {
        debug!(
            self.log,
            "Recomputing duties after reorg";
            "epoch" => info.epoch,
            "slot" => info.slot,
            "depth" => info.depth,
        );

        self.service.invalidate_caches_from(info.epoch);

        if info.epoch < self.next_epoch {
            // Epochs before the start of the stream were never delivered; the earliest delivered
            // epoch is recomputed instead.
            let epoch = std::cmp::max(info.epoch, self.start_epoch);
            self.push_epoch(epoch, Some(info), "reorg").await
        } else {
            self.fill_through(info.epoch, Some(info), "reorg").await
        }
    }

    /// Deliver every epoch from `next_epoch` through `target`. `reorg` is attached to `target`.
    async fn fill_through(
        &mut self,
        target: Epoch,
        reorg: Option<ReorgInfo>,
        trigger: &'static str,
    ) -> Result<(), ApiError> {
        while self.next_epoch <= target {
            let epoch = self.next_epoch;
            let (reorg, trigger) = if epoch == target {
                (reorg, trigger)
            } else if self.phase == Phase::Backfilling {
                (None, trigger)
            } else {
                (None, "gap_fill")
            };

            self.push_epoch(epoch, reorg, trigger).await?;
            self.next_epoch = epoch + 1;
        }
        Ok(())
    }

    /// Compute and send the snapshot of `epoch`. Epochs that cannot be computed are skipped
    /// unless the failure means the state itself cannot be trusted.
    async fn push_epoch(
        &mut self,
        epoch: Epoch,
        reorg: Option<ReorgInfo>,
        trigger: &'static str,
    ) -> Result<(), ApiError> {
        let snapshot = match self.service.duty_snapshot(epoch, reorg) {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_structural() => {
                warn!(
                    self.log,
                    "Closing duty stream on untrusted state";
                    "epoch" => epoch,
                    "error" => ?e,
                );
                return Err(ApiError::Canceled(CancelReason::UntrustedState));
            }
            Err(DutyError::Api(e)) if e.is_terminal_for_stream() => return Err(e),
            Err(e) => {
                metrics::inc_counter(&metrics::DUTY_EPOCHS_SKIPPED);
                warn!(
                    self.log,
                    "Skipping epoch in duty stream";
                    "epoch" => epoch,
                    "trigger" => trigger,
                    "error" => ?e,
                );
                return Ok(());
            }
        };

        tokio::select! {
            biased;
            _ = self.ctx.cancelled() => {
                return Err(ApiError::Canceled(CancelReason::Connection));
            }
            _ = &mut self.exit => {
                return Err(ApiError::Canceled(CancelReason::Service));
            }
            result = self.tx.send(snapshot) => {
                result.map_err(|_| {
                    ApiError::Unavailable(format!("failed to send duties of epoch {}", epoch))
                })?;
            }
        }

        metrics::inc_counter_vec(&metrics::DUTY_SNAPSHOTS_PUSHED, &[trigger]);
        debug!(
            self.log,
            "Pushed duty snapshot";
            "epoch" => epoch,
            "trigger" => trigger,
            "phase" => self.phase.as_str(),
        );

        Ok(())
    }
}

fn close_reason(reason: &ApiError) -> &'static str {
    match reason {
        ApiError::Canceled(CancelReason::Connection) => "connection",
        ApiError::Canceled(CancelReason::Service) => "service",
        ApiError::Canceled(CancelReason::Transport) => "transport",
        ApiError::Canceled(CancelReason::UntrustedState) => "untrusted_state",
        ApiError::Aborted(_) => "aborted",
        ApiError::Unavailable(_) => "unavailable",
        ApiError::InvalidRequest(_) | ApiError::NotFound(_) | ApiError::ComputationFailure(_) => {
            "error"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use types::test_utils::deterministic_pubkey;

    #[test]
    fn snapshot_json_uses_quoted_integers() {
        let snapshot = DutySnapshot {
            epoch: Epoch::new(3),
            epoch_start_timestamp: 1_606_824_144,
            proposer_pubkeys_by_slot: btreemap! {
                Slot::new(24) => deterministic_pubkey(1),
                Slot::new(25) => deterministic_pubkey(2),
            },
            reorg: None,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["epoch"], "3");
        assert_eq!(json["epoch_start_timestamp"], "1606824144");
        assert!(json["proposer_pubkeys_by_slot"]["24"].is_string());
        assert!(json["reorg"].is_null());
        assert_eq!(
            serde_json::from_value::<DutySnapshot>(json).unwrap(),
            snapshot
        );
    }

    #[test]
    fn close_reason_labels() {
        assert_eq!(
            close_reason(&ApiError::Canceled(CancelReason::Transport)),
            "transport"
        );
        assert_eq!(
            close_reason(&ApiError::Canceled(CancelReason::UntrustedState)),
            "untrusted_state"
        );
        assert_eq!(close_reason(&ApiError::Aborted(String::new())), "aborted");
        assert_eq!(close_reason(&ApiError::not_found("x")), "error");
    }

    #[tokio::test]
    async fn neither_feed_starves_the_other() {
        let (boundary_tx, boundary_rx) = tokio::sync::broadcast::channel(64);
        let (reorg_tx, reorg_rx) = tokio::sync::broadcast::channel(64);
        for i in 0..64 {
            boundary_tx
                .send(EpochBoundary { slot: Slot::new(i) })
                .unwrap();
            reorg_tx
                .send(ReorgInfo {
                    slot: Slot::new(i),
                    epoch: Epoch::new(0),
                    depth: 1,
                    old_head_root: types::Hash256::zero(),
                    new_head_root: types::Hash256::repeat_byte(1),
                })
                .unwrap();
        }

        let mut boundaries = BroadcastStream::new(boundary_rx);
        let mut reorgs = BroadcastStream::new(reorg_rx);
        let (mut seen_boundaries, mut seen_reorgs) = (0, 0);
        for _ in 0..64 {
            match next_event(&mut boundaries, &mut reorgs).await {
                Event::EpochBoundary(Some(Ok(_))) => seen_boundaries += 1,
                Event::Reorg(Some(Ok(_))) => seen_reorgs += 1,
                other => panic!("unexpected event {:?}", other),
            }
        }

        assert!(seen_boundaries > 0);
        assert!(seen_reorgs > 0);
    }
}
