//! Distributed-transfer channel: the same chunk encoding over in-memory byte
//! frames. Byte layout is identical to the snapshot channel's per-chunk
//! records, so a chunk encoded for one channel decodes on the other.

use crate::chunk::UncompressedChunk;
use crate::encoding::{
    deserialize_chunk, serialize_chunk, ChunkSink, ChunkSource, MAX_ENCODED_CHUNK_BYTES,
};
use crate::error::ChunkError;

/// [`ChunkSink`] accumulating one outbound transfer frame.
#[derive(Debug, Default)]
pub struct TransferSink {
    frame: Vec<u8>,
}

impl TransferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulated frame, ready to hand to the transport.
    pub fn into_frame(self) -> Vec<u8> {
        self.frame
    }
}

impl ChunkSink for TransferSink {
    fn write_unsigned(&mut self, value: u64) -> Result<(), ChunkError> {
        self.frame.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn write_buffer(&mut self, bytes: &[u8]) -> Result<(), ChunkError> {
        self.frame
            .extend_from_slice(&(bytes.len() as u64).to_le_bytes());
        self.frame.extend_from_slice(bytes);
        Ok(())
    }
}

/// [`ChunkSource`] cursoring over a received transfer frame.
#[derive(Debug)]
pub struct TransferSource<'a> {
    frame: &'a [u8],
    pos: usize,
}

impl<'a> TransferSource<'a> {
    pub fn new(frame: &'a [u8]) -> Self {
        Self { frame, pos: 0 }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], ChunkError> {
        let end = self
            .pos
            .checked_add(count)
            .filter(|&end| end <= self.frame.len())
            .ok_or_else(|| ChunkError::Deserialization {
                details: "truncated transfer frame".to_string(),
            })?;
        let bytes = &self.frame[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }
}

impl ChunkSource for TransferSource<'_> {
    fn read_unsigned(&mut self) -> Result<u64, ChunkError> {
        let raw = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        Ok(u64::from_le_bytes(buf))
    }

    fn read_buffer(&mut self) -> Result<Vec<u8>, ChunkError> {
        let len = self.read_unsigned()? as usize;
        if len > MAX_ENCODED_CHUNK_BYTES {
            return Err(ChunkError::Deserialization {
                details: format!("refusing to read oversized buffer ({} bytes)", len),
            });
        }
        Ok(self.take(len)?.to_vec())
    }
}

/// Encodes one chunk into a standalone transfer frame.
pub fn encode_chunk(chunk: &UncompressedChunk) -> Result<Vec<u8>, ChunkError> {
    let mut sink = TransferSink::new();
    serialize_chunk(chunk, &mut sink)?;
    Ok(sink.into_frame())
}

/// Decodes one chunk from a received transfer frame.
pub fn decode_chunk(frame: &[u8]) -> Result<UncompressedChunk, ChunkError> {
    let mut source = TransferSource::new(frame);
    deserialize_chunk(&mut source)
}
