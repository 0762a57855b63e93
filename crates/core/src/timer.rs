//! Cancellable single-shot deferred action for manual overrides.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// At most one pending deferred action. Re-arming cancels the previous task
/// before spawning the new one; callers serialize arm/cancel with their
/// controller lock so an in-flight expiry can never slip past a replacement.
#[derive(Debug, Default)]
pub struct OverrideTimer {
    handle: Option<JoinHandle<()>>,
}

impl OverrideTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any pending action, then run `action` after `delay`.
    pub fn arm<F>(&mut self, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        }));
    }

    /// Abort the pending action, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for OverrideTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicU32>, impl Fn() -> u32) {
        let c = Arc::new(AtomicU32::new(0));
        let read = {
            let c = Arc::clone(&c);
            move || c.load(Ordering::SeqCst)
        };
        (c, read)
    }

    #[tokio::test]
    async fn armed_action_fires_after_delay() {
        let (c, fired) = counter();
        let mut timer = OverrideTimer::new();
        timer.arm(Duration::from_millis(20), async move {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timer.is_armed());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired(), 1);
        assert!(!timer.is_armed());
    }

    #[tokio::test]
    async fn cancel_prevents_firing() {
        let (c, fired) = counter();
        let mut timer = OverrideTimer::new();
        timer.arm(Duration::from_millis(20), async move {
            c.fetch_add(1, Ordering::SeqCst);
        });
        timer.cancel();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired(), 0);
        assert!(!timer.is_armed());
    }

    #[tokio::test]
    async fn rearm_replaces_pending_action() {
        let (c1, first) = counter();
        let (c2, second) = counter();
        let mut timer = OverrideTimer::new();
        timer.arm(Duration::from_millis(20), async move {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        timer.arm(Duration::from_millis(40), async move {
            c2.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(first(), 0, "replaced action must never run");
        assert_eq!(second(), 1);
    }

    #[tokio::test]
    async fn drop_cancels_pending_action() {
        let (c, fired) = counter();
        {
            let mut timer = OverrideTimer::new();
            timer.arm(Duration::from_millis(20), async move {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired(), 0);
    }
}
