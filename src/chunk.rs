use crate::buffer::SampleBuf;
use crate::encoding::{deserialize_chunk, serialize_chunk, ChunkSink, ChunkSource};
use crate::error::ChunkError;
use crate::iter::{ChunkIterator, IterDirection};
use crate::policy::DuplicatePolicy;
use crate::query::{self, DomainChunk, QueryContext};
use crate::types::{Sample, Timestamp, SAMPLE_SIZE};
use serde::{Deserialize, Serialize};

/// Smallest accepted chunk capacity: room for at least four samples.
pub const MIN_CHUNK_SIZE_BYTES: usize = 4 * SAMPLE_SIZE;
/// Largest accepted chunk capacity.
pub const MAX_CHUNK_SIZE_BYTES: usize = 1024 * 1024;
/// Default capacity for newly created chunks.
pub const DEFAULT_CHUNK_SIZE_BYTES: usize = 4096;

/// Configuration for chunk creation, parseable from a host config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkOptions {
    /// Byte capacity of newly created chunks.
    pub chunk_size_bytes: usize,
    /// How an upsert at an existing timestamp resolves the conflict.
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size_bytes: DEFAULT_CHUNK_SIZE_BYTES,
            duplicate_policy: DuplicatePolicy::Block,
        }
    }
}

impl ChunkOptions {
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.chunk_size_bytes < MIN_CHUNK_SIZE_BYTES
            || self.chunk_size_bytes > MAX_CHUNK_SIZE_BYTES
        {
            return Err(ChunkError::InvalidConfig(format!(
                "chunk_size_bytes must be within [{}, {}], got {}",
                MIN_CHUNK_SIZE_BYTES, MAX_CHUNK_SIZE_BYTES, self.chunk_size_bytes
            )));
        }
        if self.chunk_size_bytes % SAMPLE_SIZE != 0 {
            return Err(ChunkError::InvalidConfig(format!(
                "chunk_size_bytes must be a multiple of {}, got {}",
                SAMPLE_SIZE, self.chunk_size_bytes
            )));
        }
        Ok(())
    }

    /// Validates and creates an empty chunk of the configured capacity.
    pub fn new_chunk(&self) -> Result<UncompressedChunk, ChunkError> {
        self.validate()?;
        UncompressedChunk::with_capacity(self.chunk_size_bytes)
    }
}

/// The operation set shared by every chunk encoding.
///
/// `UncompressedChunk` is the implementor in this crate; a compressed encoding
/// lives behind the same trait so callers program only against the interface.
pub trait Chunk: Sized {
    /// Creates an empty chunk with the requested byte capacity.
    fn with_capacity(capacity_bytes: usize) -> Result<Self, ChunkError>;

    fn num_samples(&self) -> usize;

    /// Byte capacity of the backing buffer (not the live sample count).
    fn capacity_bytes(&self) -> usize;

    fn is_full(&self) -> bool;

    /// Memory footprint: the backing buffer, plus the struct itself when
    /// `include_struct` is set.
    fn utilized_bytes(&self, include_struct: bool) -> usize;

    /// Timestamp of the logically first sample; `None` when empty.
    fn first_timestamp(&self) -> Option<Timestamp>;

    /// Timestamp of the logically last sample; `None` when empty.
    fn last_timestamp(&self) -> Option<Timestamp>;

    /// O(1) tail append. The caller guarantees the incoming timestamp is >=
    /// every stored timestamp (monotonic producer); no ordering or duplicate
    /// check is performed. Returns `Full` on a saturated chunk with no
    /// mutation, signaling the caller to rotate.
    fn add_sample(&mut self, sample: Sample) -> Result<(), ChunkError>;

    /// Inserts or updates while preserving sort order; for producers that are
    /// not monotonic or may rewrite an existing timestamp. Returns the number
    /// of new rows inserted (0 on an in-place policy resolution, 1 on insert)
    /// so callers can maintain external counters.
    fn upsert_sample(
        &mut self,
        sample: Sample,
        policy: DuplicatePolicy,
    ) -> Result<usize, ChunkError>;

    /// Removes every sample with `start <= timestamp <= end` (inclusive both
    /// ends) and returns the removed count.
    fn delete_range(&mut self, start: Timestamp, end: Timestamp) -> Result<usize, ChunkError>;

    /// Splits the tail half off into a new chunk sized exactly for it; the
    /// original is truncated to the head and its buffer shrunk to match. An
    /// odd total leaves the larger half in the original.
    fn split(&mut self) -> Result<Self, ChunkError>;

    /// Deep copy with an independent lifetime.
    fn try_clone(&self) -> Result<Self, ChunkError>;

    /// Sample cursor in the chosen direction. The borrow keeps the chunk
    /// immutable while the iterator is live.
    fn iter(&self, direction: IterDirection) -> ChunkIterator<'_>;

    /// Extracts `[start, end]` (inclusive) into the context's scratch buffer
    /// without mutating the chunk or allocating once the scratch is warm.
    /// `Ok(None)` means no sample matched. The returned view is valid until
    /// the next query on the same context.
    fn range_query<'ctx>(
        &self,
        start: Timestamp,
        end: Timestamp,
        reverse: bool,
        filter: Option<&dyn Fn(&Sample) -> bool>,
        ctx: &'ctx mut QueryContext,
    ) -> Result<Option<&'ctx DomainChunk>, ChunkError>;

    /// Encodes the chunk through the injected write primitives.
    fn serialize(&self, sink: &mut dyn ChunkSink) -> Result<(), ChunkError>;

    /// Decodes a fresh chunk through the injected read primitives. Any failure
    /// aborts the decode; the caller receives no partially valid chunk.
    fn deserialize(source: &mut dyn ChunkSource) -> Result<Self, ChunkError>;
}

/// The uncompressed chunk encoding: a contiguous buffer of samples sorted
/// ascending by timestamp with no duplicates, plus a cached first timestamp.
///
/// Exclusively owned by whoever holds it; components needing a copy clone.
#[derive(Debug)]
pub struct UncompressedChunk {
    pub(crate) samples: SampleBuf,
    /// Cached `samples[0].timestamp`; stale (never read) when empty.
    pub(crate) base_timestamp: Timestamp,
}

impl UncompressedChunk {
    /// Like [`Chunk::with_capacity`] but with an explicit start-address
    /// alignment, used for cache-line-aligned scratch buffers.
    pub fn with_capacity_aligned(
        capacity_bytes: usize,
        alignment: usize,
    ) -> Result<Self, ChunkError> {
        Ok(Self {
            samples: SampleBuf::new(capacity_bytes, alignment)?,
            base_timestamp: 0,
        })
    }

    /// The live samples, sorted ascending by timestamp.
    pub fn samples(&self) -> &[Sample] {
        self.samples.as_slice()
    }
}

impl Chunk for UncompressedChunk {
    fn with_capacity(capacity_bytes: usize) -> Result<Self, ChunkError> {
        Self::with_capacity_aligned(capacity_bytes, 0)
    }

    fn num_samples(&self) -> usize {
        self.samples.len()
    }

    fn capacity_bytes(&self) -> usize {
        self.samples.capacity_bytes()
    }

    fn is_full(&self) -> bool {
        self.samples.is_full()
    }

    fn utilized_bytes(&self, include_struct: bool) -> usize {
        let mut bytes = self.samples.capacity_bytes();
        if include_struct {
            bytes += std::mem::size_of::<Self>();
        }
        bytes
    }

    fn first_timestamp(&self) -> Option<Timestamp> {
        self.samples.as_slice().first().map(|s| s.timestamp)
    }

    fn last_timestamp(&self) -> Option<Timestamp> {
        self.samples.as_slice().last().map(|s| s.timestamp)
    }

    fn add_sample(&mut self, sample: Sample) -> Result<(), ChunkError> {
        if self.samples.is_full() {
            return Err(ChunkError::Full);
        }
        if self.samples.is_empty() {
            self.base_timestamp = sample.timestamp;
        }
        self.samples.push(sample);
        Ok(())
    }

    fn upsert_sample(
        &mut self,
        sample: Sample,
        policy: DuplicatePolicy,
    ) -> Result<usize, ChunkError> {
        let ts = sample.timestamp;
        // Chunk sizes are bounded by the split policy, so the linear scan stays cheap.
        let index = self
            .samples
            .as_slice()
            .iter()
            .position(|s| s.timestamp >= ts)
            .unwrap_or(self.samples.len());

        if index < self.samples.len() && self.samples.as_slice()[index].timestamp == ts {
            let existing = self.samples.as_slice()[index];
            let resolved = policy.resolve(existing, sample)?;
            self.samples.as_mut_slice()[index].value = resolved;
            return Ok(0);
        }

        if self.samples.is_full() {
            // Grow by exactly one sample's worth; rotation pressure belongs to
            // the caller's split threshold, not to geometric growth here.
            let grown = self.samples.capacity_bytes() + SAMPLE_SIZE;
            self.samples.reallocate(grown)?;
        }
        self.samples.insert(index, sample);
        if index == 0 {
            self.base_timestamp = ts;
        }
        Ok(1)
    }

    fn delete_range(&mut self, start: Timestamp, end: Timestamp) -> Result<usize, ChunkError> {
        if self.samples.is_empty() || end < start {
            return Ok(0);
        }
        let mut survivors =
            SampleBuf::new(self.samples.capacity_bytes(), self.samples.alignment())?;
        for sample in self.samples.as_slice() {
            if sample.timestamp >= start && sample.timestamp <= end {
                continue;
            }
            survivors.push(*sample);
        }
        let removed = self.samples.len() - survivors.len();
        self.samples = survivors;
        // A delete that empties the chunk leaves base_timestamp stale; the
        // Option-returning accessors keep it unreadable until the next append.
        if let Some(first) = self.samples.as_slice().first() {
            self.base_timestamp = first.timestamp;
        }
        Ok(removed)
    }

    fn split(&mut self) -> Result<Self, ChunkError> {
        let total = self.samples.len();
        let tail_count = total / 2;
        let head_count = total - tail_count;

        let mut tail = Self::with_capacity(tail_count * SAMPLE_SIZE)?;
        for sample in &self.samples.as_slice()[head_count..] {
            tail.add_sample(*sample)?;
        }

        self.samples.truncate(head_count);
        self.samples.reallocate(head_count * SAMPLE_SIZE)?;
        Ok(tail)
    }

    fn try_clone(&self) -> Result<Self, ChunkError> {
        Ok(Self {
            samples: self.samples.try_clone()?,
            base_timestamp: self.base_timestamp,
        })
    }

    fn iter(&self, direction: IterDirection) -> ChunkIterator<'_> {
        ChunkIterator::new(self.samples.as_slice(), direction)
    }

    fn range_query<'ctx>(
        &self,
        start: Timestamp,
        end: Timestamp,
        reverse: bool,
        filter: Option<&dyn Fn(&Sample) -> bool>,
        ctx: &'ctx mut QueryContext,
    ) -> Result<Option<&'ctx DomainChunk>, ChunkError> {
        query::extract_range(self, start, end, reverse, filter, ctx)
    }

    fn serialize(&self, sink: &mut dyn ChunkSink) -> Result<(), ChunkError> {
        serialize_chunk(self, sink)
    }

    fn deserialize(source: &mut dyn ChunkSource) -> Result<Self, ChunkError> {
        deserialize_chunk(source)
    }
}
