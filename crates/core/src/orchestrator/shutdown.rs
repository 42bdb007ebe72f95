//! Cooperative stop signal for download runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct StopState {
    stopped: AtomicBool,
    notify: Notify,
}

/// Cloneable handle used to ask a running orchestrator to stop.
///
/// Items already being processed finish; nothing new is claimed or started.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    inner: Arc<StopState>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Wakes every waiter; repeated calls are no-ops.
    pub fn stop(&self) {
        if !self.inner.stopped.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Wait until a stop is requested. Returns immediately if already stopped.
    pub async fn wait(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent stop() is not missed.
        notified.as_mut().enable();
        if self.is_stopped() {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_stop_is_shared_between_clones() {
        let handle = StopHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_stopped());

        handle.stop();
        handle.stop();
        assert!(clone.is_stopped());
    }

    #[tokio::test]
    async fn test_wait_returns_when_already_stopped() {
        let handle = StopHandle::new();
        handle.stop();
        tokio::time::timeout(Duration::from_secs(1), handle.wait())
            .await
            .expect("wait should return immediately");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_wakes_on_stop() {
        let handle = StopHandle::new();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        handle.stop();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}
