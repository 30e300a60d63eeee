use std::io;

/// Errors surfaced by the partition cache and discovery index.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("partition cache I/O error: {0}")]
    Io(#[from] io::Error),

    /// The cache file's recorded `serializedLength`s do not sum to its
    /// actual size. The affected partition is treated as absent.
    #[error("partition {partition} cache file is corrupt")]
    Corruption { partition: u32 },

    #[error("partition {partition} table failed to deserialize: {source}")]
    Deserialize {
        partition: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
