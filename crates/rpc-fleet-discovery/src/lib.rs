//! The discovery index ("C6"/"C7"): a sharded table crawler plus a parallel
//! scorer and greedy set-cover query engine, answering "which tables best
//! cover this set of accounts" without ever blocking on a live call.

mod cache;
mod config;
mod error;
mod events;
mod fetcher;
mod index;
mod table;

pub use config::{DiscoveryConfig, DiscoveryConfigBuilder, MAX_ACCOUNTS};
pub use error::DiscoveryError;
pub use events::FetchEvent;
pub use fetcher::{PartitionHandler, PartitionedTableFetcher, TableSource};
pub use index::DiscoveryIndex;
pub use table::{LookupTable, ScoredTable};
