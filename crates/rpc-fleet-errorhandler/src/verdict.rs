use std::time::Duration;

/// What the call dispatcher should do after a failed attempt.
///
/// The specification describes this as a signed delay (nonnegative = sleep
/// then retry, zero = retry immediately, negative = give up); this crate
/// models the same three outcomes without overloading the sign of a
/// duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Sleep for the given duration (possibly zero, meaning retry now), then
    /// retry against the same item.
    Delay(Duration),
    /// This item should not be retried; the dispatcher fails over or, if no
    /// items remain, propagates the error.
    GiveUp,
}

impl Verdict {
    pub fn is_give_up(&self) -> bool {
        matches!(self, Verdict::GiveUp)
    }

    pub fn delay(&self) -> Option<Duration> {
        match self {
            Verdict::Delay(d) => Some(*d),
            Verdict::GiveUp => None,
        }
    }
}
