use rpc_fleet_core::FleetEvent;
use std::time::{Duration, Instant};

/// Events emitted by the call dispatcher as it moves through the
/// `Selecting -> Invoking -> {Succeeded | Failing}` state machine.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// The operation succeeded.
    Success {
        retry_log_context: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// An attempt failed but the dispatcher will sleep and retry the same
    /// item.
    Backoff {
        retry_log_context: String,
        timestamp: Instant,
        error_count: u32,
        delay: Duration,
    },
    /// An attempt failed and the dispatcher rotated to a different item.
    Failover {
        retry_log_context: String,
        timestamp: Instant,
        retry: u32,
    },
    /// The call was given up on: the error handler signaled give-up, or
    /// `max_retries` was exceeded.
    GiveUp {
        retry_log_context: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// Courteous mode exhausted `max_try_claim` without `force_call`.
    NoCapacity {
        retry_log_context: String,
        timestamp: Instant,
    },
}

impl FleetEvent for DispatchEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DispatchEvent::Success { .. } => "Success",
            DispatchEvent::Backoff { .. } => "Backoff",
            DispatchEvent::Failover { .. } => "Failover",
            DispatchEvent::GiveUp { .. } => "GiveUp",
            DispatchEvent::NoCapacity { .. } => "NoCapacity",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            DispatchEvent::Success { timestamp, .. }
            | DispatchEvent::Backoff { timestamp, .. }
            | DispatchEvent::Failover { timestamp, .. }
            | DispatchEvent::GiveUp { timestamp, .. }
            | DispatchEvent::NoCapacity { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            DispatchEvent::Success {
                retry_log_context, ..
            }
            | DispatchEvent::Backoff {
                retry_log_context, ..
            }
            | DispatchEvent::Failover {
                retry_log_context, ..
            }
            | DispatchEvent::GiveUp {
                retry_log_context, ..
            }
            | DispatchEvent::NoCapacity {
                retry_log_context, ..
            } => retry_log_context,
        }
    }
}
