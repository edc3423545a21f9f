use crate::buffer::SampleBuf;
use crate::chunk::UncompressedChunk;
use crate::error::ChunkError;
use crate::types::{Sample, Timestamp};
use log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Start-address alignment for scratch buffers.
pub const CACHE_LINE_BYTES: usize = 64;

/// Process-wide high-water mark for scratch buffer capacity.
///
/// The mark only ever grows for the process lifetime. Every range query
/// observes its source chunk's byte capacity here; a worker whose scratch
/// falls below the mark reallocates before reuse, so occasional resizes are
/// amortized across all future queries on every worker.
#[derive(Debug, Default)]
pub struct ScratchWatermark {
    bytes: AtomicUsize,
}

impl ScratchWatermark {
    pub fn new() -> Self {
        Self {
            bytes: AtomicUsize::new(0),
        }
    }

    /// Raises the mark to at least `required_bytes`. `fetch_max` keeps the
    /// ratchet monotonic under concurrent raises; a stale lower value can
    /// never overwrite a higher one.
    pub fn observe(&self, required_bytes: usize) {
        self.bytes.fetch_max(required_bytes, Ordering::SeqCst);
    }

    pub fn current(&self) -> usize {
        self.bytes.load(Ordering::SeqCst)
    }
}

/// A chunk wrapper used as a reusable, direction-tagged query result buffer.
///
/// `reversed` records whether the samples were written in descending
/// timestamp order, so later consumers interpret iteration direction
/// correctly.
#[derive(Debug)]
pub struct DomainChunk {
    pub(crate) chunk: UncompressedChunk,
    pub(crate) reversed: bool,
}

impl DomainChunk {
    /// The extracted samples, in the order recorded by [`is_reversed`].
    ///
    /// [`is_reversed`]: DomainChunk::is_reversed
    pub fn samples(&self) -> &[Sample] {
        self.chunk.samples.as_slice()
    }

    pub fn num_samples(&self) -> usize {
        self.chunk.samples.len()
    }

    /// True when the samples are in descending timestamp order.
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Flips the sample order in place and the direction tag with it.
    pub fn reverse_in_place(&mut self) {
        self.chunk.samples.as_mut_slice().reverse();
        self.reversed = !self.reversed;
        if let Some(first) = self.chunk.samples.as_slice().first() {
            self.chunk.base_timestamp = first.timestamp;
        }
    }
}

/// Per-worker query state: one reusable scratch [`DomainChunk`] and a handle
/// to the shared capacity watermark.
///
/// Each execution thread owns exactly one context. The scratch starts at zero
/// capacity and is sized lazily from the watermark on first use; after that
/// warm-up, range extraction never allocates until the mark grows past the
/// local capacity.
#[derive(Debug)]
pub struct QueryContext {
    watermark: Arc<ScratchWatermark>,
    scratch: DomainChunk,
}

impl QueryContext {
    pub fn new(watermark: Arc<ScratchWatermark>) -> Self {
        Self {
            watermark,
            scratch: DomainChunk {
                chunk: UncompressedChunk {
                    samples: SampleBuf::empty(CACHE_LINE_BYTES),
                    base_timestamp: 0,
                },
                reversed: false,
            },
        }
    }

    /// Raises the watermark for `required_bytes`, grows the local scratch to
    /// the mark if it lags, and hands out the reset buffer.
    pub(crate) fn checkout(
        &mut self,
        required_bytes: usize,
    ) -> Result<&mut DomainChunk, ChunkError> {
        self.watermark.observe(required_bytes);
        let target = self.watermark.current();
        if self.scratch.chunk.samples.capacity_bytes() < target {
            debug!(
                "growing scratch buffer {} -> {} bytes",
                self.scratch.chunk.samples.capacity_bytes(),
                target
            );
            // Fresh aligned allocation; the previous block is freed after the
            // new one is in place. Never a resize-in-place.
            self.scratch.chunk.samples = SampleBuf::new(target, CACHE_LINE_BYTES)?;
        }
        self.scratch.chunk.samples.clear();
        self.scratch.reversed = false;
        Ok(&mut self.scratch)
    }
}

/// Copies the samples of `chunk` within `[start, end]` (inclusive) into the
/// context's scratch buffer, optionally reversed, optionally filtered.
/// `Ok(None)` is the "no data" result.
pub(crate) fn extract_range<'ctx>(
    chunk: &UncompressedChunk,
    start: Timestamp,
    end: Timestamp,
    reverse: bool,
    filter: Option<&dyn Fn(&Sample) -> bool>,
    ctx: &'ctx mut QueryContext,
) -> Result<Option<&'ctx DomainChunk>, ChunkError> {
    let samples = chunk.samples.as_slice();
    if samples.is_empty()
        || end < start
        || chunk.base_timestamp > end
        || samples[samples.len() - 1].timestamp < start
    {
        return Ok(None);
    }

    // TODO: both index scans could use partition_point once chunks grow past
    // the configured split threshold in practice.
    let start_index = match samples.iter().position(|s| s.timestamp >= start) {
        Some(index) => index,
        None => return Ok(None), // every timestamp is below start
    };
    let end_index = match samples[start_index..].iter().position(|s| s.timestamp > end) {
        Some(0) => return Ok(None), // the match window sits in a gap
        Some(offset) => start_index + offset - 1,
        None => samples.len() - 1,
    };

    let scratch = ctx.checkout(chunk.samples.capacity_bytes())?;
    let window = &samples[start_index..=end_index];
    match (reverse, filter) {
        (false, None) => scratch.chunk.samples.push_slice(window),
        (false, Some(keep)) => {
            for sample in window {
                if keep(sample) {
                    scratch.chunk.samples.push(*sample);
                }
            }
        }
        (true, None) => {
            for sample in window.iter().rev() {
                scratch.chunk.samples.push(*sample);
            }
            scratch.reversed = true;
        }
        (true, Some(keep)) => {
            for sample in window.iter().rev() {
                if keep(sample) {
                    scratch.chunk.samples.push(*sample);
                }
            }
            scratch.reversed = true;
        }
    }

    if scratch.chunk.samples.is_empty() {
        return Ok(None);
    }
    scratch.chunk.base_timestamp = scratch.chunk.samples.as_slice()[0].timestamp;
    Ok(Some(scratch))
}
