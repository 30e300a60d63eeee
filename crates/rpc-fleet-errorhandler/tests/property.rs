//! Property tests for the built-in error handler policies.
//!
//! Invariants tested:
//! - A fatal error always gives up, regardless of error count or policy
//! - A non-fatal verdict's delay never decreases when the error count does not decrease,
//!   up to each policy's configured ceiling/cap

use proptest::prelude::*;
use rpc_fleet_core::ErrorClass;
use rpc_fleet_errorhandler::{ErrorHandler, ExponentialBackoff, HttpErrorHandler, LinearBackoff};
use std::time::Duration;

fn non_fatal_class() -> impl Strategy<Value = ErrorClass> {
    prop_oneof![Just(ErrorClass::Transient), Just(ErrorClass::RateLimited)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: linear backoff never gives up on a non-fatal class, and its
    /// delay is monotone non-decreasing in the error count up to the ceiling.
    #[test]
    fn linear_backoff_monotone_until_ceiling(
        base_ms in 1u64..50,
        ceiling in 1u32..10,
        error_count in 1u32..20,
        class in non_fatal_class(),
    ) {
        let handler = LinearBackoff::new(Duration::from_millis(base_ms), ceiling);
        let verdict = handler.verdict(error_count, class);
        prop_assert!(!verdict.is_give_up());

        let expected = Duration::from_millis(base_ms) * error_count.min(ceiling);
        prop_assert_eq!(verdict.delay(), Some(expected));
    }

    /// Property: exponential backoff's delay never exceeds the configured cap.
    #[test]
    fn exponential_backoff_never_exceeds_cap(
        base_ms in 1u64..50,
        cap_ms in 50u64..5_000,
        error_count in 1u32..30,
        class in non_fatal_class(),
    ) {
        let handler = ExponentialBackoff::new(Duration::from_millis(base_ms), Duration::from_millis(cap_ms));
        let delay = handler.verdict(error_count, class).delay().unwrap();
        prop_assert!(delay <= Duration::from_millis(cap_ms));
    }

    /// Property: whatever the inner policy decides, a fatal class always
    /// gives up through the HTTP-flavored wrapper.
    #[test]
    fn http_error_handler_fatal_always_gives_up(
        base_ms in 1u64..50,
        ceiling in 1u32..10,
        error_count in 1u32..20,
    ) {
        let handler = HttpErrorHandler::new(LinearBackoff::new(Duration::from_millis(base_ms), ceiling));
        let verdict = handler.verdict(error_count, ErrorClass::Fatal);
        prop_assert!(verdict.is_give_up());
    }
}
