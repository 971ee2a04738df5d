//! Shutdown fan-out.

use tokio::sync::broadcast;

/// One trigger, many listeners: the proxy accept loop, the RPC server and
/// the origin each hold a receiver and stop when it fires.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the signal. Safe to call more than once or with no receivers.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Receivers still alive, i.e. servers that have not exited yet.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve when `rx` fires or its sender is gone. Suitable for axum's
/// `with_graceful_shutdown`.
pub async fn signalled(mut rx: broadcast::Receiver<()>) {
    let _ = rx.recv().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let a = shutdown.subscribe();
        let b = shutdown.clone().subscribe();
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();
        shutdown.trigger();
        signalled(a).await;
        signalled(b).await;
        assert_eq!(shutdown.receiver_count(), 0);
    }

    #[tokio::test]
    async fn dropped_coordinator_also_releases_waiters() {
        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        drop(shutdown);
        signalled(rx).await;
    }
}
