use rpc_fleet_core::FleetEvent;
use std::time::{Duration, Instant};

/// Events emitted by the partitioned table fetcher.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    /// A partition finished loading (from a live fetch, not the disk cache).
    PartitionLoaded {
        timestamp: Instant,
        partition: u32,
        table_count: usize,
        avg_unique_accounts: f64,
        elapsed: Duration,
    },
    /// A partition's fetch call failed.
    PartitionFetchFailed { timestamp: Instant, partition: u32 },
    /// Writing a partition to the disk cache failed; the in-memory result is
    /// kept, only the cache write is dropped.
    CacheWriteFailed { timestamp: Instant, partition: u32 },
    /// `allTables` was republished after a refresh.
    Republished {
        timestamp: Instant,
        table_count: usize,
    },
}

impl FleetEvent for FetchEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FetchEvent::PartitionLoaded { .. } => "PartitionLoaded",
            FetchEvent::PartitionFetchFailed { .. } => "PartitionFetchFailed",
            FetchEvent::CacheWriteFailed { .. } => "CacheWriteFailed",
            FetchEvent::Republished { .. } => "Republished",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            FetchEvent::PartitionLoaded { timestamp, .. }
            | FetchEvent::PartitionFetchFailed { timestamp, .. }
            | FetchEvent::CacheWriteFailed { timestamp, .. }
            | FetchEvent::Republished { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        "discovery-index"
    }
}
