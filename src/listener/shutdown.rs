use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// Cloneable stop flag whose sleeps wake up as soon as it is triggered
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been triggered
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `duration`. Returns `false` if shutdown interrupted the wait.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_triggered() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_triggered(),
            _ = notified => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_sleep_completes_without_trigger() {
        let shutdown = Shutdown::new();
        assert!(shutdown.sleep(Duration::from_millis(5)).await);
    }

    #[tokio::test]
    async fn test_trigger_interrupts_sleep() {
        let shutdown = Shutdown::new();
        let handle = shutdown.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.trigger();
        });

        let start = Instant::now();
        let completed = shutdown.sleep(Duration::from_secs(60)).await;

        assert!(!completed);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_wait_resolves_on_trigger() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.clone();
        let task = tokio::spawn(async move { waiter.wait().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("wait should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_sleep_after_trigger_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        assert!(!shutdown.sleep(Duration::from_secs(60)).await);
    }
}
