//! The call dispatcher ("C5"): the retry/failover state machine that
//! composes a load balancer, capacity monitors, and an error handler to
//! execute a user-supplied asynchronous operation against a fleet of
//! interchangeable backends.

mod config;
mod dispatcher;
mod events;

pub use config::{CallContext, CallContextBuilder, DispatchMode};
pub use dispatcher::{CallDispatcher, DispatchError};
pub use events::DispatchEvent;
