use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use slog::{debug, trace, Logger};
use tokio::sync::broadcast::{self, error::SendError, Receiver, Sender};
use types::{Epoch, Hash256, Slot};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// The first slot of a new epoch has been reached by the head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochBoundary {
    pub slot: Slot,
}

/// The canonical head moved to a block that does not descend from the previous head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorgInfo {
    pub slot: Slot,
    /// The earliest epoch whose duties may have changed.
    pub epoch: Epoch,
    #[serde(with = "serde_utils::quoted_u64")]
    pub depth: u64,
    pub old_head_root: Hash256,
    pub new_head_root: Hash256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    EpochBoundary(EpochBoundary),
    Reorg(ReorgInfo),
}

/// Fan-out of chain events to every open stream.
///
/// Each subscriber receives its own copy of every event registered after it subscribed. A
/// subscriber that falls more than the channel capacity behind observes a lag and misses the
/// oldest events.
pub struct EventFeed {
    epoch_boundary_tx: RwLock<Option<Sender<EpochBoundary>>>,
    reorg_tx: RwLock<Option<Sender<ReorgInfo>>>,
    log: Logger,
}

impl EventFeed {
    pub fn new(log: Logger) -> Self {
        Self::new_with_capacity(log, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn new_with_capacity(log: Logger, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (epoch_boundary_tx, _) = broadcast::channel(capacity);
        let (reorg_tx, _) = broadcast::channel(capacity);

        Self {
            epoch_boundary_tx: RwLock::new(Some(epoch_boundary_tx)),
            reorg_tx: RwLock::new(Some(reorg_tx)),
            log,
        }
    }

    pub fn register(&self, kind: EventKind) {
        let result = match kind {
            EventKind::EpochBoundary(event) => match self.epoch_boundary_tx.read().as_ref() {
                Some(tx) => tx
                    .send(event)
                    .map(|count| {
                        trace!(
                            self.log,
                            "Registering epoch boundary event";
                            "receiver_count" => count
                        )
                    })
                    .map_err(|SendError(e)| EventKind::EpochBoundary(e)),
                None => Err(kind),
            },
            EventKind::Reorg(event) => match self.reorg_tx.read().as_ref() {
                Some(tx) => tx
                    .send(event)
                    .map(|count| {
                        trace!(self.log, "Registering reorg event"; "receiver_count" => count)
                    })
                    .map_err(|SendError(e)| EventKind::Reorg(e)),
                None => Err(kind),
            },
        };
        if let Err(event) = result {
            trace!(self.log, "No receivers registered to listen for event"; "event" => ?event);
        }
    }

    pub fn subscribe_epoch_boundary(&self) -> Receiver<EpochBoundary> {
        match self.epoch_boundary_tx.read().as_ref() {
            Some(tx) => tx.subscribe(),
            None => closed_receiver(),
        }
    }

    pub fn subscribe_reorg(&self) -> Receiver<ReorgInfo> {
        match self.reorg_tx.read().as_ref() {
            Some(tx) => tx.subscribe(),
            None => closed_receiver(),
        }
    }

    pub fn epoch_boundary_receiver_count(&self) -> usize {
        self.epoch_boundary_tx
            .read()
            .as_ref()
            .map_or(0, Sender::receiver_count)
    }

    pub fn reorg_receiver_count(&self) -> usize {
        self.reorg_tx.read().as_ref().map_or(0, Sender::receiver_count)
    }

    /// Close both feeds. Every subscriber observes the closure once it has drained the events
    /// already sent.
    pub fn close(&self) {
        self.epoch_boundary_tx.write().take();
        self.reorg_tx.write().take();
        debug!(self.log, "Event feed closed");
    }
}

/// A receiver whose sender has already gone away.
fn closed_receiver<T: Clone>() -> Receiver<T> {
    let (_, rx) = broadcast::channel(1);
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let feed = EventFeed::new(logging::test_logger());
        let mut rx = feed.subscribe_epoch_boundary();
        feed.register(EventKind::EpochBoundary(EpochBoundary { slot: Slot::new(8) }));
        assert_eq!(rx.recv().await, Ok(EpochBoundary { slot: Slot::new(8) }));
        assert_eq!(feed.epoch_boundary_receiver_count(), 1);
        assert_eq!(feed.reorg_receiver_count(), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber() {
        let feed = EventFeed::new_with_capacity(logging::test_logger(), 2);
        let mut rx = feed.subscribe_epoch_boundary();
        for slot in 0..4 {
            feed.register(EventKind::EpochBoundary(EpochBoundary { slot: Slot::new(slot) }));
        }
        assert_eq!(rx.recv().await, Err(RecvError::Lagged(2)));
        assert_eq!(rx.recv().await, Ok(EpochBoundary { slot: Slot::new(2) }));
    }

    #[tokio::test]
    async fn close_ends_subscriptions() {
        let feed = EventFeed::new(logging::test_logger());
        let mut rx = feed.subscribe_reorg();
        feed.close();
        assert_eq!(rx.recv().await, Err(RecvError::Closed));

        let mut late = feed.subscribe_reorg();
        assert_eq!(late.recv().await, Err(RecvError::Closed));
    }

    #[test]
    fn reorg_info_json() {
        let info = ReorgInfo {
            slot: Slot::new(70),
            epoch: Epoch::new(2),
            depth: 3,
            old_head_root: Hash256::repeat_byte(1),
            new_head_root: Hash256::repeat_byte(2),
        };
        let json = serde_json::to_value(info).unwrap();
        assert_eq!(json["slot"], "70");
        assert_eq!(json["depth"], "3");
        assert_eq!(serde_json::from_value::<ReorgInfo>(json).unwrap(), info);
    }
}
