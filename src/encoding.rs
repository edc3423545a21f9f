//! Chunk wire encoding: one generic encode/decode pair over injected
//! write/read primitives, instantiated by the snapshot and transfer channels.
//!
//! The field order is fixed: `base_timestamp`, `num_samples`, byte capacity,
//! then the sample buffer as one length-prefixed blob of exactly capacity
//! bytes. Both channels share this layout, so a chunk encoded for one can be
//! decoded by the other given matching primitives.

use crate::buffer::SampleBuf;
use crate::chunk::UncompressedChunk;
use crate::error::ChunkError;
use crate::types::{Sample, SAMPLE_SIZE};

/// Upper bound accepted for an encoded sample buffer; decode refuses to
/// allocate past it.
pub const MAX_ENCODED_CHUNK_BYTES: usize = 512 * 1024 * 1024;

/// Write primitives a serialization channel injects into the encoder.
/// Fire-and-forget from the encoder's point of view; failures propagate
/// unchanged.
pub trait ChunkSink {
    fn write_unsigned(&mut self, value: u64) -> Result<(), ChunkError>;
    fn write_buffer(&mut self, bytes: &[u8]) -> Result<(), ChunkError>;
}

/// Read primitives a serialization channel injects into the decoder.
pub trait ChunkSource {
    fn read_unsigned(&mut self) -> Result<u64, ChunkError>;
    fn read_buffer(&mut self) -> Result<Vec<u8>, ChunkError>;
}

/// Encodes the chunk's four fields through `sink` in the fixed wire order.
pub fn serialize_chunk<S: ChunkSink + ?Sized>(
    chunk: &UncompressedChunk,
    sink: &mut S,
) -> Result<(), ChunkError> {
    sink.write_unsigned(chunk.base_timestamp)?;
    sink.write_unsigned(chunk.samples.len() as u64)?;
    sink.write_unsigned(chunk.samples.capacity_bytes() as u64)?;

    let blob = encode_sample_blob(chunk.samples.as_slice(), chunk.samples.capacity_bytes());
    sink.write_buffer(&blob)
}

/// Decodes a fresh chunk from `source`. Any read failure or inconsistent
/// field aborts the decode; the partially built chunk is dropped and the
/// caller receives only the error.
pub fn deserialize_chunk<R: ChunkSource + ?Sized>(
    source: &mut R,
) -> Result<UncompressedChunk, ChunkError> {
    let base_timestamp = source.read_unsigned()?;
    let num_samples = source.read_unsigned()? as usize;
    let capacity_bytes = source.read_unsigned()? as usize;

    if capacity_bytes > MAX_ENCODED_CHUNK_BYTES {
        return Err(ChunkError::Deserialization {
            details: format!(
                "refusing to allocate oversized chunk buffer ({} bytes)",
                capacity_bytes
            ),
        });
    }
    let live_bytes = num_samples
        .checked_mul(SAMPLE_SIZE)
        .filter(|&bytes| bytes <= capacity_bytes)
        .ok_or_else(|| ChunkError::Deserialization {
            details: format!(
                "sample count {} exceeds declared capacity of {} bytes",
                num_samples, capacity_bytes
            ),
        })?;

    let blob = source.read_buffer()?;
    if blob.len() != capacity_bytes {
        return Err(ChunkError::Deserialization {
            details: format!(
                "sample buffer length {} does not match declared capacity {}",
                blob.len(),
                capacity_bytes
            ),
        });
    }

    let mut samples = SampleBuf::new(capacity_bytes, 0)?;
    for raw in blob[..live_bytes].chunks_exact(SAMPLE_SIZE) {
        samples.push(decode_sample(raw));
    }
    Ok(UncompressedChunk {
        samples,
        base_timestamp,
    })
}

fn encode_sample_blob(samples: &[Sample], capacity_bytes: usize) -> Vec<u8> {
    let mut blob = Vec::with_capacity(capacity_bytes);
    for sample in samples {
        blob.extend_from_slice(&sample.timestamp.to_le_bytes());
        blob.extend_from_slice(&sample.value.to_bits().to_le_bytes());
    }
    // Dead capacity rides along zeroed, keeping the on-wire buffer exactly as
    // large as the in-memory one.
    blob.resize(capacity_bytes, 0);
    blob
}

fn decode_sample(raw: &[u8]) -> Sample {
    let mut timestamp = [0u8; 8];
    timestamp.copy_from_slice(&raw[..8]);
    let mut value = [0u8; 8];
    value.copy_from_slice(&raw[8..16]);
    Sample {
        timestamp: u64::from_le_bytes(timestamp),
        value: f64::from_bits(u64::from_le_bytes(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;

    /// In-memory sink/source used to exercise the generic pair directly.
    #[derive(Default)]
    struct VecChannel {
        fields: Vec<u64>,
        buffers: Vec<Vec<u8>>,
    }

    impl ChunkSink for VecChannel {
        fn write_unsigned(&mut self, value: u64) -> Result<(), ChunkError> {
            self.fields.push(value);
            Ok(())
        }
        fn write_buffer(&mut self, bytes: &[u8]) -> Result<(), ChunkError> {
            self.buffers.push(bytes.to_vec());
            Ok(())
        }
    }

    struct VecSource {
        fields: std::vec::IntoIter<u64>,
        buffers: std::vec::IntoIter<Vec<u8>>,
    }

    impl From<VecChannel> for VecSource {
        fn from(channel: VecChannel) -> Self {
            Self {
                fields: channel.fields.into_iter(),
                buffers: channel.buffers.into_iter(),
            }
        }
    }

    impl ChunkSource for VecSource {
        fn read_unsigned(&mut self) -> Result<u64, ChunkError> {
            self.fields.next().ok_or_else(|| ChunkError::Deserialization {
                details: "missing field".to_string(),
            })
        }
        fn read_buffer(&mut self) -> Result<Vec<u8>, ChunkError> {
            self.buffers.next().ok_or_else(|| ChunkError::Deserialization {
                details: "missing buffer".to_string(),
            })
        }
    }

    fn chunk_of(samples: &[(u64, f64)]) -> UncompressedChunk {
        let mut chunk =
            UncompressedChunk::with_capacity((samples.len() + 1) * SAMPLE_SIZE).unwrap();
        for &(ts, val) in samples {
            chunk.add_sample(Sample::new(ts, val)).unwrap();
        }
        chunk
    }

    #[test]
    fn test_field_order_and_blob_size() {
        let chunk = chunk_of(&[(10, 1.0), (20, 2.0)]);
        let mut channel = VecChannel::default();
        serialize_chunk(&chunk, &mut channel).unwrap();

        assert_eq!(channel.fields, vec![10, 2, 3 * SAMPLE_SIZE as u64]);
        assert_eq!(channel.buffers.len(), 1);
        assert_eq!(channel.buffers[0].len(), 3 * SAMPLE_SIZE);
        // The unused tail is zeroed.
        assert!(channel.buffers[0][2 * SAMPLE_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_round_trip() {
        for samples in [
            &[][..],
            &[(10, 1.5)][..],
            &[(10, 1.0), (20, -2.0), (30, f64::MAX)][..],
        ] {
            let chunk = chunk_of(samples);
            let mut channel = VecChannel::default();
            serialize_chunk(&chunk, &mut channel).unwrap();

            let mut source = VecSource::from(channel);
            let decoded = deserialize_chunk(&mut source).unwrap();

            assert_eq!(decoded.base_timestamp, chunk.base_timestamp);
            assert_eq!(decoded.num_samples(), chunk.num_samples());
            assert_eq!(decoded.capacity_bytes(), chunk.capacity_bytes());
            assert_eq!(decoded.samples(), chunk.samples());
        }
    }

    #[test]
    fn test_decode_rejects_inconsistent_count() {
        let mut channel = VecChannel::default();
        channel.fields = vec![0, 10, SAMPLE_SIZE as u64]; // 10 samples can't fit 16 bytes
        channel.buffers = vec![vec![0u8; SAMPLE_SIZE]];

        let mut source = VecSource::from(channel);
        assert!(matches!(
            deserialize_chunk(&mut source),
            Err(ChunkError::Deserialization { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let mut channel = VecChannel::default();
        channel.fields = vec![0, 1, (2 * SAMPLE_SIZE) as u64];
        channel.buffers = vec![vec![0u8; SAMPLE_SIZE]]; // declared 32, shipped 16

        let mut source = VecSource::from(channel);
        assert!(matches!(
            deserialize_chunk(&mut source),
            Err(ChunkError::Deserialization { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_oversized_capacity() {
        let mut channel = VecChannel::default();
        channel.fields = vec![0, 0, (MAX_ENCODED_CHUNK_BYTES as u64) + 1];
        channel.buffers = vec![Vec::new()];

        let mut source = VecSource::from(channel);
        assert!(matches!(
            deserialize_chunk(&mut source),
            Err(ChunkError::Deserialization { .. })
        ));
    }

    #[test]
    fn test_truncated_input_aborts_decode() {
        let chunk = chunk_of(&[(10, 1.0)]);
        let mut channel = VecChannel::default();
        serialize_chunk(&chunk, &mut channel).unwrap();
        channel.buffers.clear(); // scalars intact, buffer missing

        let mut source = VecSource::from(channel);
        assert!(deserialize_chunk(&mut source).is_err());
    }
}
