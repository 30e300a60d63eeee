//! Property tests for the capacity monitor.
//!
//! Invariants tested:
//! - Tokens never go negative, regardless of how much is claimed
//! - Health is always in `[0, 1]`

use proptest::prelude::*;
use rpc_fleet_capacity::{CapacityConfig, CapacityMonitor, ClaimContext};
use rpc_fleet_core::{ErrorClass, TestClock};
use std::sync::Arc;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: token balance never goes negative across an arbitrary
    /// sequence of claims, however large the weight.
    #[test]
    fn tokens_never_negative(
        starting_tokens in 0u32..200,
        weights in prop::collection::vec(1u32..500, 1..30),
    ) {
        let clock = TestClock::new();
        let monitor = CapacityMonitor::new(
            CapacityConfig::builder().tokens(starting_tokens).refill_per_second(0.0).build(),
            Arc::new(clock),
        );
        let ctx = ClaimContext::default();

        for weight in weights {
            monitor.try_claim(&ctx, weight);
            monitor.claim(&ctx, weight);
            prop_assert!(monitor.tokens() >= 0.0);
        }
    }

    /// Property: health is always a value in `[0, 1]`, regardless of the
    /// mix of successes and failures recorded.
    #[test]
    fn health_stays_in_unit_range(
        outcomes in prop::collection::vec(any::<bool>(), 0..100),
        window in 1usize..20,
    ) {
        let clock = TestClock::new();
        let monitor = CapacityMonitor::new(
            CapacityConfig::builder().error_window(window).build(),
            Arc::new(clock),
        );

        for ok in outcomes {
            if ok {
                monitor.on_success();
            } else {
                monitor.on_error(ErrorClass::Transient);
            }
            let health = monitor.health();
            prop_assert!((0.0..=1.0).contains(&health));
        }
    }
}
