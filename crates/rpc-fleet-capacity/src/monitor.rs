use crate::config::{
    CapacityConfig, ClaimContext, RATE_LIMIT_PENALTY_DELAY, RATE_LIMIT_PENALTY_FRACTION,
};
use rpc_fleet_core::{Clock, ErrorClass};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Tracks a single backend's token budget, error-rate window, and future
/// availability estimate.
///
/// All mutation goes through a single internal [`Mutex`], so `try_claim` and
/// `claim` are linearizable with respect to each other as required by the
/// specification's concurrency model: treat the state as a single atomic
/// compare-and-swap loop.
pub struct CapacityMonitor {
    config: CapacityConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

struct State {
    tokens: f64,
    last_refill: Instant,
    next_available_at: Instant,
    outcomes: VecDeque<bool>,
}

impl CapacityMonitor {
    pub fn new(config: CapacityConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            state: Mutex::new(State {
                tokens: config.tokens as f64,
                last_refill: now,
                next_available_at: now,
                outcomes: VecDeque::with_capacity(config.error_window),
            }),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &CapacityConfig {
        &self.config
    }

    /// Non-mutating refill projection: how many tokens would be available
    /// if refilled right now, and the effective `next_available_at`.
    fn refill(state: &mut State, config: &CapacityConfig, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        if elapsed > Duration::ZERO {
            let refilled = elapsed.as_secs_f64() * config.refill_per_second;
            state.tokens = (state.tokens + refilled).min(config.tokens as f64);
            state.last_refill = now;
        }
    }

    /// Attempts to atomically deduct `weight` tokens. Returns `false` without
    /// mutating state if the context's policy judges the balance
    /// insufficient.
    pub fn try_claim(&self, context: &ClaimContext, weight: u32) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        Self::refill(&mut state, &self.config, now);

        let required = context.effective_requirement(weight);
        let available = state.tokens + context.burst_allowance as f64;
        if available >= required as f64 {
            state.tokens = (state.tokens - weight as f64).max(0.0);
            true
        } else {
            false
        }
    }

    /// Unconditionally deducts `weight`, driving `next_available_at` forward
    /// if the balance was insufficient (overdraft). Tokens themselves never
    /// go negative.
    pub fn claim(&self, context: &ClaimContext, weight: u32) {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        Self::refill(&mut state, &self.config, now);

        let deficit = weight as f64 - state.tokens;
        state.tokens = (state.tokens - weight as f64).max(0.0);

        if deficit > 0.0 && self.config.refill_per_second > 0.0 {
            let extra = Duration::from_secs_f64(deficit / self.config.refill_per_second);
            state.next_available_at = state.next_available_at.max(now) + extra;
        }
        let _ = context;
    }

    /// Non-mutating check of whether `try_claim` would currently succeed.
    pub fn has_capacity(&self, context: &ClaimContext, weight: u32) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        Self::refill(&mut state, &self.config, now);
        let required = context.effective_requirement(weight);
        state.tokens + context.burst_allowance as f64 >= required as f64
    }

    /// Estimated wait until `weight` tokens would be available.
    /// `Duration::ZERO` means "now".
    pub fn duration_until(&self, context: &ClaimContext, weight: u32) -> Duration {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        Self::refill(&mut state, &self.config, now);

        let required = context.effective_requirement(weight);
        let available = state.tokens + context.burst_allowance as f64;
        let token_wait = if available >= required as f64 {
            Duration::ZERO
        } else if self.config.refill_per_second <= 0.0 {
            // Tokens can never refill; the deficit is permanent.
            Duration::MAX
        } else {
            let needed = required as f64 - available;
            Duration::from_secs_f64(needed / self.config.refill_per_second)
        };

        let overdraft_wait = state.next_available_at.saturating_duration_since(now);
        token_wait.max(overdraft_wait)
    }

    /// Records a successful call, improving the health score.
    pub fn on_success(&self) {
        let mut state = self.state.lock().unwrap();
        Self::push_outcome(&mut state, &self.config, true);
    }

    /// Records a failed call and, for [`ErrorClass::RateLimited`], penalizes
    /// the token balance and pushes `next_available_at` forward.
    pub fn on_error(&self, cause: ErrorClass) {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        Self::push_outcome(&mut state, &self.config, false);

        if cause == ErrorClass::RateLimited {
            Self::refill(&mut state, &self.config, now);
            let penalty = self.config.burst as f64 * RATE_LIMIT_PENALTY_FRACTION;
            state.tokens = (state.tokens - penalty).max(0.0);
            state.next_available_at = state.next_available_at.max(now) + RATE_LIMIT_PENALTY_DELAY;
        }
    }

    fn push_outcome(state: &mut State, config: &CapacityConfig, success: bool) {
        if state.outcomes.len() >= config.error_window.max(1) {
            state.outcomes.pop_front();
        }
        state.outcomes.push_back(success);
    }

    /// A score in `[0, 1]`: `1 - error_rate` over the sliding outcome window.
    /// An empty window (no calls yet) is perfectly healthy.
    pub fn health(&self) -> f64 {
        let state = self.state.lock().unwrap();
        if state.outcomes.is_empty() {
            return 1.0;
        }
        let failures = state.outcomes.iter().filter(|ok| !**ok).count();
        1.0 - (failures as f64 / state.outcomes.len() as f64)
    }

    /// Current token balance, after a lazy refill projection. Exposed for
    /// diagnostics and tests, not part of the core selection algorithm.
    pub fn tokens(&self) -> f64 {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        Self::refill(&mut state, &self.config, now);
        state.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpc_fleet_core::TestClock;

    fn monitor(config: CapacityConfig) -> (CapacityMonitor, TestClock) {
        let clock = TestClock::new();
        let monitor = CapacityMonitor::new(config, Arc::new(clock.clone()));
        (monitor, clock)
    }

    #[test]
    fn try_claim_decrements_tokens_and_refuses_when_empty() {
        let (monitor, _clock) = monitor(CapacityConfig::builder().tokens(2).build());
        let ctx = ClaimContext::default();

        assert!(monitor.try_claim(&ctx, 1));
        assert!(monitor.try_claim(&ctx, 1));
        assert!(!monitor.try_claim(&ctx, 1));
    }

    #[test]
    fn refill_restores_tokens_over_time() {
        let (monitor, clock) = monitor(
            CapacityConfig::builder()
                .tokens(1)
                .refill_per_second(1.0)
                .build(),
        );
        let ctx = ClaimContext::default();

        assert!(monitor.try_claim(&ctx, 1));
        assert!(!monitor.try_claim(&ctx, 1));

        clock.advance(Duration::from_secs(1));
        assert!(monitor.try_claim(&ctx, 1));
    }

    #[test]
    fn claim_overdrafts_without_going_negative() {
        let (monitor, _clock) = monitor(
            CapacityConfig::builder()
                .tokens(0)
                .refill_per_second(1.0)
                .build(),
        );
        let ctx = ClaimContext::default();

        monitor.claim(&ctx, 5);
        assert_eq!(monitor.tokens(), 0.0);
        assert!(monitor.duration_until(&ctx, 1) > Duration::ZERO);
    }

    #[test]
    fn accounting_invariant_tokens_plus_claims_equals_initial_plus_refill() {
        let (monitor, clock) = monitor(
            CapacityConfig::builder()
                .tokens(10)
                .refill_per_second(2.0)
                .build(),
        );
        let ctx = ClaimContext::default();
        let weight = 1u32;
        let mut claims = 0u32;

        for _ in 0..5 {
            if monitor.try_claim(&ctx, weight) {
                claims += 1;
            }
            clock.advance(Duration::from_millis(100));
        }

        let refilled = 5 * 100 / 1000 * 2; // coarse lower bound, refill is monotone
        let tokens_after = monitor.tokens();
        assert!(tokens_after + (claims * weight) as f64 >= 10.0 + refilled as f64 - 1.0);
    }

    #[test]
    fn health_reflects_recent_error_rate() {
        let (monitor, _clock) = monitor(CapacityConfig::builder().error_window(4).build());
        assert_eq!(monitor.health(), 1.0);

        monitor.on_success();
        monitor.on_error(ErrorClass::Transient);
        monitor.on_error(ErrorClass::Transient);
        monitor.on_success();

        assert_eq!(monitor.health(), 0.5);
    }

    #[test]
    fn rate_limited_error_penalizes_tokens() {
        let (monitor, _clock) = monitor(
            CapacityConfig::builder()
                .tokens(10)
                .burst(4)
                .refill_per_second(0.0)
                .build(),
        );
        let before = monitor.tokens();
        monitor.on_error(ErrorClass::RateLimited);
        assert!(monitor.tokens() < before);
    }
}
