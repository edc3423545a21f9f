#![doc = include_str!("../README.md")]
// Declare modules
pub mod buffer;
pub mod chunk;
pub mod encoding;
pub mod error;
pub mod iter;
pub mod persistence;
pub mod policy;
pub mod query;
pub mod transfer;
pub mod types;

/// The operation set shared by every chunk encoding.
pub use crate::chunk::Chunk;
/// Configuration for chunk creation.
pub use crate::chunk::ChunkOptions;
/// The uncompressed chunk encoding: sorted, contiguous sample storage.
pub use crate::chunk::UncompressedChunk;
/// Error type for chunk operations.
pub use crate::error::ChunkError;
/// Sample cursor over a chunk.
pub use crate::iter::{ChunkIterator, IterDirection};
/// Duplicate-timestamp resolution strategy for upserts.
pub use crate::policy::DuplicatePolicy;
/// Direction-tagged scratch/result buffer for range queries.
pub use crate::query::DomainChunk;
/// Per-worker query state owning the reusable scratch buffer.
pub use crate::query::QueryContext;
/// Process-wide scratch capacity high-water mark.
pub use crate::query::ScratchWatermark;
/// Represents a single time-series data point.
pub use crate::types::Sample;
/// Type alias for a timestamp (nanoseconds since epoch).
pub use crate::types::Timestamp;
/// Type alias for a value in a time series (f64).
pub use crate::types::Value;
/// In-memory footprint of one sample record.
pub use crate::types::SAMPLE_SIZE;
