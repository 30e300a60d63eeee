//! The error handler ("C2"): a pure function of `(error_count, error_class)`
//! that the call dispatcher consults after every failed attempt to decide
//! whether to sleep and retry, retry immediately, or give up on the current
//! item.

mod config;
mod policy;
mod verdict;

pub use config::{BackoffPolicy, ErrorHandlerConfig, ErrorHandlerConfigBuilder};
pub use policy::{ErrorHandler, ExponentialBackoff, HttpErrorHandler, LinearBackoff};
pub use rpc_fleet_core::ErrorClass;
pub use verdict::Verdict;
