//! Per-backend capacity tracking ("C1" in the design overview): a lazily
//! refilled token bucket plus a sliding error-rate window used to compute a
//! `[0, 1]` health score.
//!
//! Callers MUST go through [`CapacityMonitor::try_claim`] followed by the
//! call, or [`CapacityMonitor::claim`] followed by the call — never invoke
//! the backend without accounting for it first.

mod config;
mod monitor;

pub use config::{
    CapacityConfig, CapacityConfigBuilder, ClaimContext, RATE_LIMIT_PENALTY_DELAY,
    RATE_LIMIT_PENALTY_FRACTION,
};
pub use monitor::CapacityMonitor;
pub use rpc_fleet_core::ErrorClass;
