use rpc_fleet_capacity::CapacityMonitor;
use rpc_fleet_core::Clock;
use rpc_fleet_errorhandler::ErrorHandler;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A backend paired with its capacity bookkeeping, error handler, and
/// latency/health samples ("C3" in the design overview).
///
/// `BalancedItem` does not hold a back-pointer to the `LoadBalancer` that
/// owns it: the cyclic `BalancedItem <-> ErrorHandler <-> CapacityMonitor`
/// ownership the original design hinted at is flattened into a
/// struct-of-values, consistent with how the rest of this workspace avoids
/// back-pointers in favor of indices/shared references.
pub struct BalancedItem<B> {
    pub item: B,
    pub capacity: Arc<CapacityMonitor>,
    pub error_handler: Arc<dyn ErrorHandler>,
    clock: Arc<dyn Clock>,
    /// EWMA of observed latencies, in milliseconds, stored as raw bits so it
    /// can be read/written without a lock on the hot path.
    latency_ewma_millis: AtomicU64,
    skip_until: Mutex<Instant>,
    pub(crate) insertion_index: usize,
}

/// Smoothing factor for the latency EWMA: each sample contributes this much
/// weight, the running average the rest.
const LATENCY_EWMA_ALPHA: f64 = 0.2;

impl<B> BalancedItem<B> {
    pub fn new(
        item: B,
        capacity: Arc<CapacityMonitor>,
        error_handler: Arc<dyn ErrorHandler>,
        clock: Arc<dyn Clock>,
        insertion_index: usize,
    ) -> Self {
        let now = clock.now();
        Self {
            item,
            capacity,
            error_handler,
            skip_until: Mutex::new(now),
            latency_ewma_millis: AtomicU64::new(0),
            clock,
            insertion_index,
        }
    }

    /// Records a completed call's latency, updating the EWMA used for
    /// ordering.
    pub fn sample(&self, latency: Duration) {
        let sample_millis = latency.as_secs_f64() * 1000.0;
        let mut prev = f64::from_bits(self.latency_ewma_millis.load(Ordering::Relaxed));
        loop {
            let next = if prev == 0.0 {
                sample_millis
            } else {
                prev + LATENCY_EWMA_ALPHA * (sample_millis - prev)
            };
            match self.latency_ewma_millis.compare_exchange_weak(
                prev.to_bits(),
                next.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => prev = f64::from_bits(observed),
            }
        }
    }

    pub fn latency_ewma(&self) -> Duration {
        Duration::from_secs_f64(
            f64::from_bits(self.latency_ewma_millis.load(Ordering::Relaxed)) / 1000.0,
        )
    }

    /// Marks this item as unselectable until `now + duration`.
    pub fn skip_for(&self, duration: Duration) {
        let mut skip_until = self.skip_until.lock().unwrap();
        *skip_until = self.clock.now() + duration;
    }

    pub fn is_skipped(&self) -> bool {
        self.clock.now() < *self.skip_until.lock().unwrap()
    }

    pub fn health(&self) -> f64 {
        self.capacity.health()
    }
}

impl<B: PartialEq> PartialEq for BalancedItem<B> {
    fn eq(&self, other: &Self) -> bool {
        self.item == other.item
    }
}
