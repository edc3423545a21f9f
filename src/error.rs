use crate::types::Timestamp;
use thiserror::Error;

/// Custom error type for chunk operations.
#[derive(Error, Debug)]
pub enum ChunkError {
    /// The allocator could not satisfy a buffer request. Fatal to the attempted
    /// operation, never to the process.
    #[error("Allocation of {bytes} bytes failed")]
    Allocation { bytes: usize },

    /// Append attempted on a saturated chunk. Expected during normal ingestion;
    /// the caller rotates to a new chunk.
    #[error("Chunk is full")]
    Full,

    /// Upsert at an existing timestamp rejected by the active duplicate policy.
    #[error("Duplicate sample at timestamp {0} rejected by policy")]
    DuplicateSample(Timestamp),

    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or truncated encoded input. The failed decode leaves no
    /// partially built chunk reachable.
    #[error("Deserialization failed: {details}")]
    Deserialization { details: String },

    #[error("Configuration Error: {0}")]
    InvalidConfig(String),
}
