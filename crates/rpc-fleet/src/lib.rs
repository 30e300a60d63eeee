//! Client-side RPC infrastructure for fleets of interchangeable backends —
//! the deployment this grew out of is a cluster of Solana JSON-RPC
//! endpoints, but nothing here is Solana-specific beyond the `PublicKey`
//! newtype used as a lookup key.
//!
//! Two independent subsystems live here:
//!
//! - **Call dispatcher** ([`CallDispatcher`]) — a retry/failover state
//!   machine that selects the best available backend from a
//!   [`LoadBalancer`], claims [`CapacityConfig`]-governed capacity against
//!   it, invokes a caller-supplied async operation, and rotates to the next
//!   backend on failure according to an [`ErrorHandler`] policy.
//! - **Discovery index** (`discovery`, feature-gated) — a sharded array of
//!   lookup tables kept warm by a background crawler, queried by a parallel
//!   scorer and a greedy set-cover selector.
//!
//! # Quick Start
//!
//! ```toml
//! [dependencies]
//! rpc-fleet = { version = "0.1", features = ["discovery"] }
//! ```
//!
//! ```rust,no_run
//! use rpc_fleet::{CallContext, CallDispatcher, CapacityConfig, HttpErrorHandler, LinearBackoff, LoadBalancer, SystemClock};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[derive(Debug)]
//! # struct OpError;
//! # impl std::fmt::Display for OpError {
//! #     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "op error") }
//! # }
//! # impl std::error::Error for OpError {}
//! # impl rpc_fleet::DispatchError for OpError {
//! #     fn class(&self) -> rpc_fleet::ErrorClass { rpc_fleet::ErrorClass::Transient }
//! # }
//! # async fn example() {
//! let clock = Arc::new(SystemClock);
//! let backoff = LinearBackoff::new(Duration::from_millis(50), 5);
//! let balancer = Arc::new(LoadBalancer::new(
//!     vec!["https://rpc-a.example", "https://rpc-b.example"],
//!     CapacityConfig::default(),
//!     Arc::new(HttpErrorHandler::new(backoff)),
//!     clock.clone(),
//! ));
//! let dispatcher = CallDispatcher::new(balancer, clock, CallContext::default(), "get-balance");
//!
//! let result = dispatcher
//!     .get(|backend| async move {
//!         // call out to `backend.item` here
//!         Ok::<_, OpError>(42)
//!     })
//!     .await;
//! # let _ = result;
//! # }
//! ```
//!
//! # Patterns
//!
//! ## Call Dispatcher
//!
//! Retries and fails over across a fixed fleet of backends, tracking
//! per-backend capacity (token bucket) and health (sliding error window) so
//! that unhealthy or rate-limited backends sort to the back of the queue
//! instead of being hammered.
//!
//! ### When to Use
//!
//! - Any client talking to a horizontally-replicated, interchangeable
//!   backend fleet (RPC clusters, read replicas, CDN edges)
//! - When backpressure should show up as failover, not an unbounded retry
//!   storm against the same struggling node
//!
//! ### Trade-offs
//!
//! - Courteous mode can return [`FleetError::NoCapacity`] under sustained
//!   load rather than overdrafting every backend's token bucket
//! - Ordering is only eventually consistent: concurrent `get()` calls may
//!   observe slightly different snapshots of the balancer's ranking
//!
//! ## Discovery Index
//!
//! Answers "which tables cover this set of accounts" from an in-memory
//! snapshot, refreshed in the background by a sharded partition crawler
//! that itself goes through the call dispatcher.
//!
//! ### When to Use
//!
//! - Lookups against a large, shardable reference dataset where an
//!   occasional stale read is acceptable in exchange for never blocking a
//!   query on a network call
//!
//! ### Anti-Patterns
//!
//! ❌ **Expecting exact covers**: the greedy selector is allowed to leave
//! one account uncovered per query (see [`discovery`] module docs)
//! ✅ Treat the result as best-effort and handle a missing account
//! explicitly at the call site

pub use rpc_fleet_balancer::{BalancedItem, LoadBalancer};
pub use rpc_fleet_capacity::{CapacityConfig, CapacityMonitor, ClaimContext};
pub use rpc_fleet_core::{
    Clock, ErrorClass, EventListener, EventListeners, FleetError, FleetEvent, FnListener,
    PublicKey, PublicKeyParseError, SystemClock, TestClock,
};
pub use rpc_fleet_dispatcher::{CallContext, CallContextBuilder, CallDispatcher, DispatchError, DispatchEvent, DispatchMode};
pub use rpc_fleet_errorhandler::{
    BackoffPolicy, ErrorHandler, ErrorHandlerConfig, ErrorHandlerConfigBuilder,
    ExponentialBackoff, HttpErrorHandler, LinearBackoff, Verdict,
};

/// The sharded discovery index: partitioned table fetcher (C6) and the
/// parallel scorer / greedy set-cover query engine (C7).
///
/// Feature-gated separately from the call dispatcher because it pulls in
/// `rayon` and `arc-swap` that a pure dispatcher client has no use for.
#[cfg(feature = "discovery")]
pub mod discovery {
    pub use rpc_fleet_discovery::*;
}
