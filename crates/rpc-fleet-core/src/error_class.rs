//! The error taxonomy shared by the capacity monitor and the error handler
//! (see the error handling design section of the crate documentation).

/// The class of a failed call, as judged by the caller before reporting it
/// to the capacity monitor and the error handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorClass {
    /// Network I/O, remote 5xx: absorbed by the error handler as a delay.
    Transient,
    /// A transient failure specifically caused by the backend rate-limiting
    /// the caller (e.g. HTTP 429). May additionally bias the capacity state.
    RateLimited,
    /// Remote 4xx (non-429), schema violations: the error handler gives up
    /// on this item rather than scheduling a retry.
    Fatal,
}

impl ErrorClass {
    /// True for classes the error handler should never retry, regardless of
    /// `errorCount`.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorClass::Fatal)
    }
}
