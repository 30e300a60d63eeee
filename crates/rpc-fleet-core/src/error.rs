//! A common error type that every layer (capacity, error handler, dispatcher,
//! discovery index) can produce without hand-written `From` boilerplate at
//! each composition seam.
//!
//! # Example
//!
//! ```
//! use rpc_fleet_core::FleetError;
//!
//! #[derive(Debug)]
//! struct AppError(String);
//!
//! impl std::fmt::Display for AppError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{}", self.0)
//!     }
//! }
//! impl std::error::Error for AppError {}
//!
//! fn handle(err: FleetError<AppError>) {
//!     if err.is_no_capacity() {
//!         // caller should back off and try again later
//!     }
//! }
//! ```

use std::fmt;

/// Wraps every failure mode the dispatcher and discovery index can surface.
#[derive(Debug, Clone)]
pub enum FleetError<E> {
    /// Courteous dispatch exhausted `maxTryClaim` attempts without `forceCall`.
    NoCapacity,

    /// The error handler returned a give-up verdict, or `maxRetries` was
    /// exceeded. Carries the diagnostic `retryLogContext` supplied at
    /// dispatcher construction so the origin of a call can be recovered from
    /// logs.
    GivenUp {
        retry_log_context: String,
        source: E,
    },

    /// The operation future, or a backoff/capacity sleep, was cancelled.
    Cancelled,

    /// A partition cache file failed its size/length cross-check and was
    /// treated as absent.
    Corruption { partition: u32 },

    /// The wrapped service returned an application error that isn't covered
    /// by one of the categories above.
    Application(E),
}

impl<E> FleetError<E> {
    pub fn is_no_capacity(&self) -> bool {
        matches!(self, FleetError::NoCapacity)
    }

    pub fn is_given_up(&self) -> bool {
        matches!(self, FleetError::GivenUp { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FleetError::Cancelled)
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, FleetError::Corruption { .. })
    }

    pub fn is_application(&self) -> bool {
        matches!(self, FleetError::Application(_))
    }

    pub fn into_application(self) -> Option<E> {
        match self {
            FleetError::Application(e) | FleetError::GivenUp { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

impl<E> fmt::Display for FleetError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FleetError::NoCapacity => write!(f, "no backend had capacity for this call"),
            FleetError::GivenUp {
                retry_log_context,
                source,
            } => write!(f, "gave up on call [{retry_log_context}]: {source}"),
            FleetError::Cancelled => write!(f, "call was cancelled"),
            FleetError::Corruption { partition } => {
                write!(f, "partition {partition} cache file is corrupt")
            }
            FleetError::Application(e) => write!(f, "application error: {e}"),
        }
    }
}

impl<E> std::error::Error for FleetError<E> where E: std::error::Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;
    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }
    impl std::error::Error for Boom {}

    #[test]
    fn predicates_match_variants() {
        assert!(FleetError::<Boom>::NoCapacity.is_no_capacity());
        assert!(FleetError::<Boom>::Cancelled.is_cancelled());
        assert!(FleetError::Corruption { partition: 3 }.is_corruption());
        assert!(FleetError::Application(Boom).is_application());
    }

    #[test]
    fn given_up_carries_context_in_display() {
        let err = FleetError::GivenUp {
            retry_log_context: "getAccountInfo".to_string(),
            source: Boom,
        };
        assert!(err.to_string().contains("getAccountInfo"));
        assert!(err.into_application().is_some());
    }
}
