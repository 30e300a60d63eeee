use std::path::PathBuf;
use std::time::Duration;

/// The hard cap on a single query's account set, forced by the 64-bit
/// bitmask used by the greedy cover routine.
pub const MAX_ACCOUNTS: usize = 64;

/// Tunables for the partitioned table fetcher (C6) and discovery index (C7).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoveryConfig {
    /// Number of partitions the keyspace is sharded into. 257 in the
    /// motivating Solana deployment.
    pub num_partitions: u32,
    /// Number of workers concurrently fetching partitions during a refresh.
    pub max_concurrent_requests: u32,
    /// Delay between the end of one refresh and the start of the next.
    /// `None` means "fetch once and stop".
    pub reload_delay: Option<Duration>,
    /// Number of windows `allTables` is split into for parallel scoring.
    pub num_partitions_per_query: u32,
    /// Bounded top-K kept per scoring window.
    pub top_tables_per_partition: u32,
    /// Tables scoring at or below this are rejected during scoring.
    pub min_score: u32,
    /// Directory partition cache files are read from / written to. `None`
    /// disables the disk cache entirely.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub cache_directory: Option<PathBuf>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            num_partitions: 257,
            max_concurrent_requests: 16,
            reload_delay: Some(Duration::from_secs(60)),
            num_partitions_per_query: 8,
            top_tables_per_partition: 32,
            min_score: 0,
            cache_directory: None,
        }
    }
}

impl DiscoveryConfig {
    pub fn builder() -> DiscoveryConfigBuilder {
        DiscoveryConfigBuilder::default()
    }

    /// `ceil(0.8 * num_partitions)`: the load threshold at which the index
    /// is considered initialized.
    pub fn initialized_threshold(&self) -> usize {
        ((self.num_partitions as f64) * 0.8).ceil() as usize
    }
}

#[derive(Debug, Default)]
pub struct DiscoveryConfigBuilder {
    config: DiscoveryConfig,
}

impl DiscoveryConfigBuilder {
    pub fn num_partitions(mut self, num_partitions: u32) -> Self {
        self.config.num_partitions = num_partitions;
        self
    }

    pub fn max_concurrent_requests(mut self, max_concurrent_requests: u32) -> Self {
        self.config.max_concurrent_requests = max_concurrent_requests;
        self
    }

    pub fn reload_delay(mut self, reload_delay: Option<Duration>) -> Self {
        self.config.reload_delay = reload_delay;
        self
    }

    pub fn num_partitions_per_query(mut self, num_partitions_per_query: u32) -> Self {
        self.config.num_partitions_per_query = num_partitions_per_query;
        self
    }

    pub fn top_tables_per_partition(mut self, top_tables_per_partition: u32) -> Self {
        self.config.top_tables_per_partition = top_tables_per_partition;
        self
    }

    pub fn min_score(mut self, min_score: u32) -> Self {
        self.config.min_score = min_score;
        self
    }

    pub fn cache_directory(mut self, cache_directory: impl Into<PathBuf>) -> Self {
        self.config.cache_directory = Some(cache_directory.into());
        self
    }

    pub fn build(self) -> DiscoveryConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threshold_matches_documented_257_partition_deployment() {
        let config = DiscoveryConfig::default();
        // ceil(0.8 * 257) = 206
        assert_eq!(config.initialized_threshold(), 206);
    }
}
