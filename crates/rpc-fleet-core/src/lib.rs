//! Shared primitives for `rpc-fleet`: address identity, the clock
//! abstraction, the unified error type and the event system.
//!
//! Every other crate in this workspace depends on this one; it carries no
//! dependency in the other direction.

pub mod clock;
pub mod error;
pub mod error_class;
pub mod events;
pub mod pubkey;

pub use clock::{Clock, SystemClock, TestClock};
pub use error::FleetError;
pub use error_class::ErrorClass;
pub use events::{EventListener, EventListeners, FleetEvent, FnListener};
pub use pubkey::{PublicKey, PublicKeyParseError};
