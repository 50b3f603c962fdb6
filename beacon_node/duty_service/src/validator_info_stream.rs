//! `StreamValidatorInfo`: lifecycle records for a client-managed set of public keys.
//!
//! Every connection runs two tasks. The listener applies the client's change sets to the
//! connection's `SubscriptionState` and immediately reports on keys that became watched. The serve
//! loop reports on every watched key at each epoch boundary and owns the connection's lifetime:
//! when it stops, the listener stops with it.

use crate::connection::{connection_context, ConnectionCanceller, ConnectionContext};
use crate::errors::{ApiError, CancelReason};
use crate::events::EpochBoundary;
use crate::metrics;
use crate::state_provider::StateProvider;
use crate::service::{DutyService, DutyServiceTypes};
use crate::subscription::{SubscriptionState, ValidatorChangeSet};
use serde::{Deserialize, Serialize};
use slog::{debug, info, o, warn, Logger};
use std::collections::HashSet;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use types::{Epoch, PublicKeyBytes};
use validator_duties::validator_status::epoch_to_timestamp;
use validator_duties::{lifecycle_status, ActivationProjection, ValidatorStatus};

/// The state of one validator as of the last completed epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub public_key: PublicKeyBytes,
    /// `None` if the key is not in the registry.
    pub index: Option<usize>,
    pub epoch: Epoch,
    pub status: ValidatorStatus,
    /// Seconds since the UNIX epoch of the next lifecycle transition, or `0` if unknown.
    #[serde(with = "serde_utils::quoted_u64")]
    pub transition_timestamp: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub balance: u64,
    /// Only reported while the validator is attesting.
    #[serde(with = "serde_utils::quoted_u64")]
    pub effective_balance: u64,
}

/// The client end of a validator-info stream.
pub struct ValidatorInfoStream {
    records: mpsc::Receiver<ValidatorInfo>,
    changes: mpsc::Sender<ValidatorChangeSet>,
    outcome: oneshot::Receiver<ApiError>,
}

impl ValidatorInfoStream {
    /// Returns the next record, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<ValidatorInfo> {
        self.records.recv().await
    }

    pub fn try_next(&mut self) -> Option<ValidatorInfo> {
        self.records.try_recv().ok()
    }

    /// Send a change of the watched keys to the server.
    pub async fn update(&self, change: ValidatorChangeSet) -> Result<(), ApiError> {
        self.changes
            .send(change)
            .await
            .map_err(|_| ApiError::Unavailable("validator info stream closed".to_string()))
    }

    /// Waits for the stream to end and returns the reason it ended.
    pub async fn outcome(&mut self) -> ApiError {
        (&mut self.outcome)
            .await
            .unwrap_or(ApiError::Canceled(CancelReason::Service))
    }

    pub fn into_parts(
        self,
    ) -> (
        mpsc::Receiver<ValidatorInfo>,
        mpsc::Sender<ValidatorChangeSet>,
        oneshot::Receiver<ApiError>,
    ) {
        (self.records, self.changes, self.outcome)
    }
}

impl<T: DutyServiceTypes> DutyService<T> {
    /// Returns a record for each of `public_keys` as of the epoch before the head's epoch.
    ///
    /// Nothing is reported while the head is in the genesis epoch.
    pub fn validator_info(
        &self,
        public_keys: &[PublicKeyBytes],
    ) -> Result<Vec<ValidatorInfo>, ApiError> {
        let head = self.state_provider.head_state()?;
        let head_epoch = head.current_epoch(&self.spec);
        if head_epoch == Epoch::new(0) {
            return Ok(vec![]);
        }
        let epoch = head_epoch - 1;

        let mut records = public_keys
            .iter()
            .map(|public_key| {
                let index = head.get_validator_index(public_key);
                let validator = index.map(|i| head.get_validator(i)).transpose()?;
                let lifecycle =
                    lifecycle_status(validator, head_epoch, head.genesis_time, &self.spec);
                let balance = index.map(|i| head.get_balance(i)).transpose()?;
                let effective_balance = validator
                    .filter(|_| lifecycle.status.reports_effective_balance())
                    .map_or(0, |v| v.effective_balance);

                Ok(ValidatorInfo {
                    public_key: *public_key,
                    index,
                    epoch,
                    status: lifecycle.status,
                    transition_timestamp: lifecycle.transition_timestamp,
                    balance: balance.unwrap_or(0),
                    effective_balance,
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()?;

        // Pending validators that have not been assigned an activation epoch yet get a projection
        // of when the activation queue will reach them.
        let pending = records
            .iter()
            .filter(|r| r.status == ValidatorStatus::Pending)
            .filter_map(|r| r.index)
            .collect::<HashSet<_>>();

        if !pending.is_empty() {
            let projection = ActivationProjection::simulate(
                head.validators(),
                &pending,
                epoch,
                head.fork_name(&self.spec),
                &self.spec,
            );
            for record in &mut records {
                let activation_epoch = record.index.and_then(|i| projection.activation_epoch(i));
                if let Some(activation_epoch) = activation_epoch {
                    record.transition_timestamp =
                        epoch_to_timestamp(activation_epoch, head.genesis_time, &self.spec);
                }
            }
        }

        Ok(records)
    }

    /// Open a validator-info stream. The stream starts with no watched keys.
    pub fn stream_validator_info(
        self: &Arc<Self>,
        ctx: ConnectionContext,
    ) -> Result<ValidatorInfoStream, ApiError> {
        let buffer = self.config.outbound_buffer.max(1);
        let boundaries = BroadcastStream::new(self.event_feed.subscribe_epoch_boundary());
        let subscription = Arc::new(SubscriptionState::new(self.config.max_validator_info_keys));

        let (tx, records) = mpsc::channel(buffer);
        let (changes_tx, changes) = mpsc::channel(buffer);
        let (failures_tx, failures) = mpsc::channel(1);
        let (outcome_tx, outcome) = oneshot::channel();
        let (listener_canceller, listener_ctx) = connection_context();

        let log = self.log.new(o!("stream" => "validator_info"));

        let listener = ChangeListener {
            service: self.clone(),
            subscription: subscription.clone(),
            tx: tx.clone(),
            changes,
            failures: failures_tx,
            stop: listener_ctx,
            log: log.clone(),
        };

        let server = ValidatorInfoServer {
            service: self.clone(),
            subscription,
            tx,
            ctx,
            exit: Box::pin(self.executor.exit()),
            failures,
            _listener: listener_canceller,
            log,
        };

        info!(self.log, "Validator info stream opened");
        metrics::inc_gauge(&metrics::ACTIVE_VALIDATOR_INFO_STREAMS);

        self.executor.spawn(listener.run(), "validator_info_listener");
        self.executor.spawn_without_exit(
            async move {
                let reason = server.run(boundaries).await;
                metrics::dec_gauge(&metrics::ACTIVE_VALIDATOR_INFO_STREAMS);
                let _ = outcome_tx.send(reason);
            },
            "validator_info_stream",
        );

        Ok(ValidatorInfoStream {
            records,
            changes: changes_tx,
            outcome,
        })
    }
}

/// Applies change sets and reports on newly watched keys.
struct ChangeListener<T: DutyServiceTypes> {
    service: Arc<DutyService<T>>,
    subscription: Arc<SubscriptionState>,
    tx: mpsc::Sender<ValidatorInfo>,
    changes: mpsc::Receiver<ValidatorChangeSet>,
    /// Reports a change set that ends the stream.
    failures: mpsc::Sender<ApiError>,
    /// Cancelled when the serve loop stops.
    stop: ConnectionContext,
    log: Logger,
}

impl<T: DutyServiceTypes> ChangeListener<T> {
    async fn run(mut self) {
        loop {
            let change = tokio::select! {
                biased;
                _ = self.stop.cancelled() => return,
                change = self.changes.recv() => match change {
                    Some(change) => change,
                    None => {
                        debug!(self.log, "Client stopped sending validator changes");
                        return;
                    }
                },
            };

            let added = match self.subscription.apply(&change) {
                Ok(added) => added,
                Err(e) => {
                    warn!(
                        self.log,
                        "Rejected validator change set";
                        "action" => ?change.action,
                        "keys" => change.public_keys.len(),
                        "error" => %e,
                    );
                    self.report_failure(e);
                    return;
                }
            };

            debug!(
                self.log,
                "Applied validator change set";
                "action" => ?change.action,
                "added" => added.len(),
                "watched" => self.subscription.len(),
            );

            if added.is_empty() {
                continue;
            }

            let records = match self.service.validator_info(&added) {
                Ok(records) => records,
                Err(e) if e.is_terminal_for_stream() => {
                    self.report_failure(e);
                    return;
                }
                Err(e) => {
                    warn!(self.log, "Unable to report on new validators"; "error" => %e);
                    continue;
                }
            };

            for record in records {
                tokio::select! {
                    biased;
                    _ = self.stop.cancelled() => return,
                    result = self.tx.send(record) => {
                        if result.is_err() {
                            return;
                        }
                    }
                }
                metrics::inc_counter(&metrics::VALIDATOR_INFO_RECORDS_PUSHED);
            }
        }
    }

    /// Hands a failure to the serve loop. Only the first failure is kept, since the stream ends
    /// on it.
    fn report_failure(&self, error: ApiError) {
        if let Err(e) = self.failures.try_send(error) {
            debug!(
                self.log,
                "Stream already ending, dropping listener failure";
                "error" => ?e.into_inner(),
            );
        }
    }
}

/// Reports on every watched key at each epoch boundary.
struct ValidatorInfoServer<T: DutyServiceTypes> {
    service: Arc<DutyService<T>>,
    subscription: Arc<SubscriptionState>,
    tx: mpsc::Sender<ValidatorInfo>,
    ctx: ConnectionContext,
    exit: Pin<Box<dyn Future<Output = ()> + Send>>,
    failures: mpsc::Receiver<ApiError>,
    /// Dropped with the server, which stops the listener.
    _listener: ConnectionCanceller,
    log: Logger,
}

impl<T: DutyServiceTypes> ValidatorInfoServer<T> {
    async fn run(mut self, mut boundaries: BroadcastStream<EpochBoundary>) -> ApiError {
        let reason = match self.serve(&mut boundaries).await {
            Ok(never) => match never {},
            Err(e) => e,
        };

        info!(
            self.log,
            "Validator info stream closed";
            "reason" => %reason,
            "watched" => self.subscription.len(),
        );

        reason
    }

    async fn serve(
        &mut self,
        boundaries: &mut BroadcastStream<EpochBoundary>,
    ) -> Result<Infallible, ApiError> {
        loop {
            // Every arm ahead of the boundary feed ends the stream.
            tokio::select! {
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
                Some(e) = self.failures.recv() => return Err(e),
                event = boundaries.next() => match event {
                    Some(Ok(boundary)) => self.report_all(boundary).await?,
                    Some(Err(BroadcastStreamRecvError::Lagged(n))) => {
                        metrics::inc_counter(&metrics::EVENT_FEED_LAGGED);
                        warn!(
                            self.log,
                            "Validator info stream fell behind the event feed";
                            "missed_events" => n,
                        );
                    }
                    None => {
                        return Err(ApiError::Aborted(
                            "epoch boundary subscription closed".to_string(),
                        ));
                    }
                },
            }
        }
    }

    async fn report_all(&mut self, boundary: EpochBoundary) -> Result<(), ApiError> {
        let public_keys = self.subscription.snapshot();
        if public_keys.is_empty() {
            return Ok(());
        }

        let records = match self.service.validator_info(&public_keys) {
            Ok(records) => records,
            Err(e) if e.is_terminal_for_stream() => return Err(e),
            Err(e) => {
                warn!(
                    self.log,
                    "Unable to report on watched validators";
                    "slot" => boundary.slot,
                    "error" => %e,
                );
                return Ok(());
            }
        };

        let count = records.len();
        for record in records {
            tokio::select! {
                biased;
                _ = self.ctx.cancelled() => {
                    return Err(ApiError::Canceled(CancelReason::Connection));
                }
                _ = &mut self.exit => {
                    return Err(ApiError::Canceled(CancelReason::Service));
                }
                result = self.tx.send(record) => {
                    result.map_err(|_| {
                        ApiError::Unavailable("failed to send validator info".to_string())
                    })?;
                }
            }
            metrics::inc_counter(&metrics::VALIDATOR_INFO_RECORDS_PUSHED);
        }

        debug!(
            self.log,
            "Reported on watched validators";
            "slot" => boundary.slot,
            "records" => count,
        );

        Ok(())
    }
}
