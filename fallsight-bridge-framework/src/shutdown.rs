//! Process-wide stop signal.
//!
//! A single [`ShutdownTrigger`] owns a `watch` channel; every worker holds a
//! cloned [`Shutdown`] and races it against its own suspension points.

use std::time::Duration;

use tokio::sync::watch;

/// Create a linked trigger/observer pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Sending half of the stop signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Create a trigger with no observers yet.
    pub fn new() -> Self {
        channel().0
    }

    /// Signal every observer to stop. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Create a new observer.
    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for ShutdownTrigger {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of the stop signal.
///
/// A dropped trigger counts as a stop request.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the stop signal has been raised.
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleep for `delay` unless stopped first.
    ///
    /// Returns `true` when the full delay elapsed, `false` on stop.
    pub async fn sleep(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.triggered() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_triggered_resolves_after_trigger() {
        let (trigger, mut shutdown) = channel();
        assert!(!shutdown.is_triggered());

        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), shutdown.triggered())
            .await
            .expect("shutdown should resolve");
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn test_triggered_stays_pending_until_trigger() {
        let (trigger, mut shutdown) = channel();
        let mut waiter = tokio_test::task::spawn(shutdown.triggered());

        tokio_test::assert_pending!(waiter.poll());
        trigger.trigger();
        assert!(waiter.is_woken());
        tokio_test::assert_ready!(waiter.poll());
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_trigger() {
        let trigger = ShutdownTrigger::new();
        trigger.trigger();
        trigger.trigger();

        let mut shutdown = trigger.subscribe();
        assert!(shutdown.is_triggered());
        shutdown.triggered().await;
    }

    #[tokio::test]
    async fn test_dropped_trigger_counts_as_stop() {
        let (trigger, mut shutdown) = channel();
        drop(trigger);
        tokio::time::timeout(Duration::from_secs(1), shutdown.triggered())
            .await
            .expect("dropped trigger should release waiters");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_without_trigger() {
        let (_trigger, mut shutdown) = channel();
        assert!(shutdown.sleep(Duration::from_secs(10)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_trigger() {
        let (trigger, mut shutdown) = channel();

        let sleeper = tokio::spawn(async move { shutdown.sleep(Duration::from_secs(3600)).await });
        tokio::task::yield_now().await;
        trigger.trigger();

        assert!(!sleeper.await.unwrap());
    }
}
