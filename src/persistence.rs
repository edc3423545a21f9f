//! Durable snapshot channel: the chunk encoding instantiated over `std::io`,
//! framed by a magic/version header for point-in-time chunk files.

use crate::chunk::UncompressedChunk;
use crate::encoding::{
    deserialize_chunk, serialize_chunk, ChunkSink, ChunkSource, MAX_ENCODED_CHUNK_BYTES,
};
use crate::error::ChunkError;
use log::warn;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const SNAP_MAGIC: &[u8; 8] = b"TCKSNP01";
const SNAP_VERSION: u32 = 1;

/// [`ChunkSink`] over any `io::Write` destination. Scalars are written as
/// little-endian u64, buffers with a u64 length prefix.
#[derive(Debug)]
pub struct SnapshotWriter<W: Write> {
    inner: W,
}

impl<W: Write> SnapshotWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ChunkSink for SnapshotWriter<W> {
    fn write_unsigned(&mut self, value: u64) -> Result<(), ChunkError> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_buffer(&mut self, bytes: &[u8]) -> Result<(), ChunkError> {
        self.inner.write_all(&(bytes.len() as u64).to_le_bytes())?;
        self.inner.write_all(bytes)?;
        Ok(())
    }
}

/// [`ChunkSource`] over any `io::Read` origin, the inverse of
/// [`SnapshotWriter`].
#[derive(Debug)]
pub struct SnapshotReader<R: Read> {
    inner: R,
}

impl<R: Read> SnapshotReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read> ChunkSource for SnapshotReader<R> {
    fn read_unsigned(&mut self) -> Result<u64, ChunkError> {
        let mut buf = [0u8; 8];
        self.inner.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn read_buffer(&mut self) -> Result<Vec<u8>, ChunkError> {
        let len = self.read_unsigned()? as usize;
        if len > MAX_ENCODED_CHUNK_BYTES {
            return Err(ChunkError::Deserialization {
                details: format!("refusing to read oversized buffer ({} bytes)", len),
            });
        }
        let mut bytes = vec![0u8; len];
        self.inner.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}

/// Writes a point-in-time snapshot of `chunks` to `path`, fsynced before
/// returning.
pub fn write_snapshot<P: AsRef<Path>>(
    path: P,
    chunks: &[UncompressedChunk],
) -> Result<(), ChunkError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(SNAP_MAGIC)?;
    writer.write_all(&SNAP_VERSION.to_le_bytes())?;
    writer.write_all(&(chunks.len() as u64).to_le_bytes())?;

    let mut sink = SnapshotWriter::new(writer);
    for chunk in chunks {
        serialize_chunk(chunk, &mut sink)?;
    }

    let mut writer = sink.into_inner();
    writer.flush()?;
    writer.get_ref().sync_data()?;
    Ok(())
}

/// Reads a snapshot written by [`write_snapshot`]. Header validation failures
/// and truncated chunk records reject the whole load; no partial chunk list is
/// returned.
pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<Vec<UncompressedChunk>, ChunkError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != SNAP_MAGIC {
        warn!("rejecting snapshot {:?}: bad magic", path);
        return Err(ChunkError::Deserialization {
            details: format!("bad snapshot magic in {:?}", path),
        });
    }
    let mut version_bytes = [0u8; 4];
    reader.read_exact(&mut version_bytes)?;
    let version = u32::from_le_bytes(version_bytes);
    if version != SNAP_VERSION {
        warn!("rejecting snapshot {:?}: unsupported version {}", path, version);
        return Err(ChunkError::Deserialization {
            details: format!("unsupported snapshot version {} in {:?}", version, path),
        });
    }

    let mut source = SnapshotReader::new(reader);
    let count = source.read_unsigned()? as usize;
    let mut chunks = Vec::new();
    for _ in 0..count {
        chunks.push(deserialize_chunk(&mut source)?);
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::types::{Sample, SAMPLE_SIZE};
    use std::fs;
    use tempfile::TempDir;

    fn chunk_of(samples: &[(u64, f64)]) -> UncompressedChunk {
        let mut chunk =
            UncompressedChunk::with_capacity((samples.len().max(1)) * SAMPLE_SIZE).unwrap();
        for &(ts, val) in samples {
            chunk.add_sample(Sample::new(ts, val)).unwrap();
        }
        chunk
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chunks.snap");

        let chunks = vec![
            chunk_of(&[]),
            chunk_of(&[(10, 1.5)]),
            chunk_of(&[(10, 1.0), (20, 2.0), (30, 3.0)]),
        ];
        write_snapshot(&path, &chunks).unwrap();

        let restored = read_snapshot(&path).unwrap();
        assert_eq!(restored.len(), 3);
        for (restored, original) in restored.iter().zip(chunks.iter()) {
            assert_eq!(restored.num_samples(), original.num_samples());
            assert_eq!(restored.capacity_bytes(), original.capacity_bytes());
            assert_eq!(restored.samples(), original.samples());
            assert_eq!(restored.first_timestamp(), original.first_timestamp());
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.snap");

        write_snapshot(&path, &[]).unwrap();
        assert_eq!(read_snapshot(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bogus.snap");
        fs::write(&path, b"NOTASNAPxxxxxxxxxxxx").unwrap();

        assert!(matches!(
            read_snapshot(&path),
            Err(ChunkError::Deserialization { .. })
        ));
    }

    #[test]
    fn test_unsupported_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("future.snap");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(SNAP_MAGIC);
        bytes.extend_from_slice(&99u32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            read_snapshot(&path),
            Err(ChunkError::Deserialization { .. })
        ));
    }

    #[test]
    fn test_truncated_snapshot_yields_no_chunks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("truncated.snap");

        write_snapshot(&path, &[chunk_of(&[(10, 1.0), (20, 2.0)])]).unwrap();
        let full = fs::read(&path).unwrap();
        fs::write(&path, &full[..full.len() - 8]).unwrap();

        assert!(read_snapshot(&path).is_err());
    }
}
