//! Built-in error handler policies.
//!
//! An [`ErrorHandler`] is a pure function of `(error_count, error_class)`.
//! It carries no per-item mutable state, so the same instance can be shared
//! across every [`BalancedItem`](../rpc_fleet_balancer/struct.BalancedItem.html)
//! in a load balancer.

use crate::verdict::Verdict;
use rand::Rng;
use rpc_fleet_core::ErrorClass;
use std::time::Duration;

/// Given how many times this item has already failed for the current call
/// and the class of the latest failure, decides whether to retry (and after
/// how long) or give up on the item entirely.
pub trait ErrorHandler: Send + Sync {
    fn verdict(&self, error_count: u32, class: ErrorClass) -> Verdict;
}

/// `delay = base * min(error_count, ceiling)`. Fatal errors always give up.
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    pub base: Duration,
    pub ceiling: u32,
}

impl LinearBackoff {
    pub fn new(base: Duration, ceiling: u32) -> Self {
        Self { base, ceiling }
    }
}

impl ErrorHandler for LinearBackoff {
    fn verdict(&self, error_count: u32, class: ErrorClass) -> Verdict {
        if class.is_fatal() {
            return Verdict::GiveUp;
        }
        let multiple = error_count.min(self.ceiling);
        Verdict::Delay(self.base * multiple)
    }
}

/// Exponential backoff with a configurable multiplier, cap and jitter.
///
/// `delay = min(base * multiplier^(error_count - 1), cap)`, then a uniformly
/// random fraction of that delay (up to `jitter`) is added, matching the
/// "exponential backoff with jitter" built-in policy of the specification.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub cap: Duration,
    pub multiplier: f64,
    /// Fraction of the computed delay added as random jitter, in `[0, 1]`.
    pub jitter: f64,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }
}

impl ErrorHandler for ExponentialBackoff {
    fn verdict(&self, error_count: u32, class: ErrorClass) -> Verdict {
        if class.is_fatal() {
            return Verdict::GiveUp;
        }
        let exponent = error_count.saturating_sub(1) as i32;
        let factor = self.multiplier.powi(exponent);
        let nominal = self.base.mul_f64(factor).min(self.cap);

        let jitter_fraction = if self.jitter > 0.0 {
            rand::rng().random_range(0.0..=self.jitter)
        } else {
            0.0
        };
        Verdict::Delay(nominal + nominal.mul_f64(jitter_fraction))
    }
}

/// The HTTP-flavored policy required by the specification: 4xx (non-429) is
/// immediately fatal, 429 and 5xx are retryable through an inner backoff
/// policy.
pub struct HttpErrorHandler<Inner> {
    inner: Inner,
}

impl<Inner> HttpErrorHandler<Inner>
where
    Inner: ErrorHandler,
{
    pub fn new(inner: Inner) -> Self {
        Self { inner }
    }
}

impl<Inner> ErrorHandler for HttpErrorHandler<Inner>
where
    Inner: ErrorHandler,
{
    fn verdict(&self, error_count: u32, class: ErrorClass) -> Verdict {
        match class {
            ErrorClass::Fatal => Verdict::GiveUp,
            ErrorClass::Transient | ErrorClass::RateLimited => {
                self.inner.verdict(error_count, class)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_backoff_scales_then_caps_at_ceiling() {
        let handler = LinearBackoff::new(Duration::from_millis(10), 3);
        assert_eq!(
            handler.verdict(1, ErrorClass::Transient),
            Verdict::Delay(Duration::from_millis(10))
        );
        assert_eq!(
            handler.verdict(2, ErrorClass::Transient),
            Verdict::Delay(Duration::from_millis(20))
        );
        assert_eq!(
            handler.verdict(10, ErrorClass::Transient),
            Verdict::Delay(Duration::from_millis(30))
        );
    }

    #[test]
    fn linear_backoff_gives_up_on_fatal() {
        let handler = LinearBackoff::new(Duration::from_millis(10), 3);
        assert_eq!(handler.verdict(1, ErrorClass::Fatal), Verdict::GiveUp);
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let handler =
            ExponentialBackoff::new(Duration::from_millis(10), Duration::from_millis(100));
        assert_eq!(
            handler.verdict(1, ErrorClass::Transient).delay(),
            Some(Duration::from_millis(10))
        );
        assert_eq!(
            handler.verdict(2, ErrorClass::Transient).delay(),
            Some(Duration::from_millis(20))
        );
        assert_eq!(
            handler.verdict(3, ErrorClass::Transient).delay(),
            Some(Duration::from_millis(40))
        );
        assert_eq!(
            handler.verdict(20, ErrorClass::Transient).delay(),
            Some(Duration::from_millis(100))
        );
    }

    #[test]
    fn exponential_backoff_jitter_only_adds_delay() {
        let handler = ExponentialBackoff::new(Duration::from_millis(10), Duration::from_secs(10))
            .with_jitter(0.5);
        for count in 1..5 {
            let delay = handler.verdict(count, ErrorClass::Transient).delay().unwrap();
            let nominal = Duration::from_millis(10).mul_f64(2f64.powi(count as i32 - 1));
            assert!(delay >= nominal);
            assert!(delay <= nominal + nominal.mul_f64(0.5));
        }
    }

    #[test]
    fn http_error_handler_treats_fatal_as_immediate_giveup() {
        let handler = HttpErrorHandler::new(LinearBackoff::new(Duration::from_millis(5), 5));
        assert_eq!(handler.verdict(1, ErrorClass::Fatal), Verdict::GiveUp);
        assert!(!handler.verdict(1, ErrorClass::RateLimited).is_give_up());
        assert!(!handler.verdict(1, ErrorClass::Transient).is_give_up());
    }
}
