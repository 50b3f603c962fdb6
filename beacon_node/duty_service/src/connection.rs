//! Per-connection cancellation.
//!
//! The transport layer creates a `ConnectionCanceller`/`ConnectionContext` pair for every client
//! connection, hands the context to the stream it opens and cancels it when the client goes away.

use tokio::sync::watch;

/// Cancels the paired `ConnectionContext`. Dropping the canceller also cancels.
#[derive(Debug)]
pub struct ConnectionCanceller {
    tx: watch::Sender<bool>,
}

/// Observes cancellation of a single client connection.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// `None` for a context with no client behind it.
    rx: Option<watch::Receiver<bool>>,
}

pub fn connection_context() -> (ConnectionCanceller, ConnectionContext) {
    let (tx, rx) = watch::channel(false);
    (ConnectionCanceller { tx }, ConnectionContext { rx: Some(rx) })
}

impl ConnectionCanceller {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl ConnectionContext {
    /// A context that is never cancelled by a client.
    pub fn detached() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        match &self.rx {
            Some(rx) => *rx.borrow() || rx.has_changed().is_err(),
            None => false,
        }
    }

    /// Completes once the connection has been cancelled.
    pub async fn cancelled(&mut self) {
        match &mut self.rx {
            // `wait_for` errors only when the canceller was dropped, which is also a
            // cancellation.
            Some(rx) => {
                let _ = rx.wait_for(|cancelled| *cancelled).await;
            }
            None => futures::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_wakes_waiters() {
        let (canceller, mut ctx) = connection_context();
        assert!(!ctx.is_cancelled());
        let waiter = tokio::spawn(async move {
            ctx.cancelled().await;
            ctx.is_cancelled()
        });
        canceller.cancel();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn dropping_the_canceller_cancels() {
        let (canceller, mut ctx) = connection_context();
        drop(canceller);
        tokio::time::timeout(Duration::from_secs(1), ctx.cancelled())
            .await
            .expect("should be cancelled");
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn detached_is_never_cancelled() {
        let mut ctx = ConnectionContext::detached();
        assert!(!ctx.is_cancelled());
        assert!(
            tokio::time::timeout(Duration::from_millis(20), ctx.cancelled())
                .await
                .is_err()
        );
    }
}
