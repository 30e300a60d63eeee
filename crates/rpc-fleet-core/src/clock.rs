//! Clock abstraction used by the capacity monitor, error handler backoff and
//! dispatcher so that time-dependent behavior (refill, backoff, skip-until)
//! can be driven deterministically from tests instead of real sleeps.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Abstracts "now" and "sleep" so production code can run on wall-clock time
/// while tests drive a [`TestClock`] forward instantly.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;

    /// Returns a future that resolves after `duration` according to this clock.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// The production clock: wall-clock time via [`tokio::time`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// A manually-advanced clock for deterministic tests.
///
/// `now()` returns a base [`Instant`] plus an offset that tests advance with
/// [`TestClock::advance`]. `sleep` resolves immediately: callers that need to
/// observe a delay assert on the *requested* duration before calling
/// `advance`, rather than relying on real time passing.
#[derive(Clone)]
pub struct TestClock {
    base: Instant,
    offset_millis: Arc<AtomicU64>,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_millis: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Moves the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        self.offset_millis
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_millis(self.offset_millis.load(Ordering::SeqCst))
    }

    fn sleep(&self, _duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(std::future::ready(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advancing_moves_now_forward() {
        let clock = TestClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_secs(5));
        let t1 = clock.now();
        assert_eq!(t1 - t0, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_clock_sleep_resolves_immediately() {
        let clock = TestClock::new();
        let start = std::time::Instant::now();
        clock.sleep(Duration::from_secs(60)).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
