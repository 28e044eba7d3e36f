//! Bounded cooperative polling.
//!
//! Every suspension point in the engine goes through [`bounded_poll`] or
//! [`settle`]: an explicit (predicate, interval, timeout) contract instead of
//! scattered ad-hoc sleeps. Under `tokio::time::pause()` both are driven by
//! the fake clock, so polling behavior is testable without wall time.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Poll `predicate` every `interval` until it returns `true` or `timeout`
/// elapses. Returns whether the predicate held.
///
/// The predicate is evaluated once immediately, so a condition that already
/// holds never waits a full interval.
pub async fn bounded_poll<F, Fut>(mut predicate: F, interval: Duration, timeout: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if predicate().await {
            return true;
        }
        if Instant::now() + interval > deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Fixed pause after a DOM-mutating action, letting asynchronous rendering
/// catch up before the next query.
pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_predicate_true_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let ok = bounded_poll(
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { true }
            },
            Duration::from_millis(100),
            Duration::from_secs(5),
        )
        .await;
        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_predicate_never_holds() {
        let start = Instant::now();
        let ok = bounded_poll(
            || async { false },
            Duration::from_millis(50),
            Duration::from_millis(400),
        )
        .await;
        assert!(!ok);
        // Never overshoots the deadline by more than one interval.
        assert!(start.elapsed() <= Duration::from_millis(450));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_mid_window() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let ok = bounded_poll(
            move || {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move { n >= 3 }
            },
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .await;
        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
