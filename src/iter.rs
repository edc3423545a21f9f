use crate::types::Sample;

/// Iteration direction for a [`ChunkIterator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterDirection {
    /// Ascending timestamps, starting at the first sample.
    Forward,
    /// Descending timestamps, starting at the last sample.
    Reverse,
}

/// Sample cursor over a chunk's live samples.
///
/// Borrows the chunk for its whole lifetime, so mutating the chunk while an
/// iterator is live is a compile error rather than documented undefined
/// behavior.
#[derive(Debug)]
pub struct ChunkIterator<'a> {
    samples: &'a [Sample],
    remaining: usize,
    direction: IterDirection,
}

impl<'a> ChunkIterator<'a> {
    pub(crate) fn new(samples: &'a [Sample], direction: IterDirection) -> Self {
        Self {
            samples,
            remaining: samples.len(),
            direction,
        }
    }

    /// Rewinds to the initial position for the cursor's direction.
    pub fn reset(&mut self) {
        self.remaining = self.samples.len();
    }

    pub fn direction(&self) -> IterDirection {
        self.direction
    }
}

impl Iterator for ChunkIterator<'_> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if self.remaining == 0 {
            return None;
        }
        let index = match self.direction {
            IterDirection::Forward => self.samples.len() - self.remaining,
            IterDirection::Reverse => self.remaining - 1,
        };
        self.remaining -= 1;
        Some(self.samples[index])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for ChunkIterator<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{Chunk, UncompressedChunk};
    use crate::types::{Timestamp, SAMPLE_SIZE};

    fn chunk_of(timestamps: &[Timestamp]) -> UncompressedChunk {
        let mut chunk =
            UncompressedChunk::with_capacity(timestamps.len() * SAMPLE_SIZE).unwrap();
        for &ts in timestamps {
            chunk.add_sample(Sample::new(ts, ts as f64)).unwrap();
        }
        chunk
    }

    #[test]
    fn test_forward_iteration() {
        let chunk = chunk_of(&[10, 20, 30]);
        let collected: Vec<Timestamp> = chunk
            .iter(IterDirection::Forward)
            .map(|s| s.timestamp)
            .collect();
        assert_eq!(collected, vec![10, 20, 30]);
    }

    #[test]
    fn test_reverse_iteration() {
        let chunk = chunk_of(&[10, 20, 30]);
        let collected: Vec<Timestamp> = chunk
            .iter(IterDirection::Reverse)
            .map(|s| s.timestamp)
            .collect();
        assert_eq!(collected, vec![30, 20, 10]);
    }

    #[test]
    fn test_empty_chunk_is_immediately_exhausted() {
        let chunk = chunk_of(&[]);
        assert_eq!(chunk.iter(IterDirection::Forward).next(), None);
        assert_eq!(chunk.iter(IterDirection::Reverse).next(), None);
    }

    #[test]
    fn test_reset_rewinds_to_direction_start() {
        let chunk = chunk_of(&[10, 20, 30]);
        let mut iter = chunk.iter(IterDirection::Reverse);
        assert_eq!(iter.next().map(|s| s.timestamp), Some(30));
        assert_eq!(iter.next().map(|s| s.timestamp), Some(20));

        iter.reset();
        assert_eq!(iter.len(), 3);
        assert_eq!(iter.next().map(|s| s.timestamp), Some(30));
    }
}
