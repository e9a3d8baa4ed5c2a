//! Snapshot wire format helpers.
//!
//! Every persisted index blob starts with a one-byte format version and ends
//! with a little-endian CRC32 of everything before it. The payload between is
//! component-specific (see the `to_bytes`/`from_bytes` pairs on the HNSW,
//! IVF, and quantizer types). A version the loader does not understand yields
//! [`SnapshotError::Version`]; a checksum or structural failure yields
//! [`SnapshotError::Corrupt`]. Both are recoverable: the engine falls back to
//! rebuilding indexes from the backing store.

use thiserror::Error;

/// Snapshot decode failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The blob's format version is not supported by this build.
    #[error("unsupported snapshot version {0}")]
    Version(u8),

    /// Structural or checksum failure while decoding.
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

/// Snapshot record kinds, matching the `index_snapshots.type` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotKind {
    /// HNSW graph state.
    Hnsw,
    /// IVF partitioning state.
    Ivf,
    /// Quantizer training state.
    Quantizer,
}

impl SnapshotKind {
    /// Key used in the backing store's snapshot table.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotKind::Hnsw => "hnsw",
            SnapshotKind::Ivf => "ivf",
            SnapshotKind::Quantizer => "quantizer",
        }
    }
}

/// Appends the CRC32 trailer to a finished payload.
#[must_use]
pub fn seal(mut payload: Vec<u8>) -> Vec<u8> {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&payload);
    payload.extend_from_slice(&hasher.finalize().to_le_bytes());
    payload
}

/// Verifies and strips the CRC32 trailer, returning the payload slice.
///
/// # Errors
///
/// [`SnapshotError::Corrupt`] when the blob is too short or the checksum does
/// not match.
pub fn open(blob: &[u8]) -> Result<&[u8], SnapshotError> {
    if blob.len() < 4 {
        return Err(SnapshotError::Corrupt("blob shorter than trailer".into()));
    }
    let (payload, trailer) = blob.split_at(blob.len() - 4);
    let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    let computed = hasher.finalize();
    if stored != computed {
        return Err(SnapshotError::Corrupt(format!(
            "checksum mismatch: stored {stored:#010x}, computed {computed:#010x}"
        )));
    }
    Ok(payload)
}

// Little-endian write helpers. Writers are infallible (Vec-backed).

/// Appends a `u32` in little-endian order.
pub fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Appends a `u64` in little-endian order.
pub fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Appends an `f32` in little-endian order.
pub fn put_f32(buf: &mut Vec<u8>, v: f32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Appends a length-prefixed byte string (`u32` LE length).
pub fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(buf, bytes.len() as u32);
    buf.extend_from_slice(bytes);
}

/// Appends a length-prefixed UTF-8 string.
pub fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_bytes(buf, s.as_bytes());
}

/// Cursor over a snapshot payload with checked reads.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Wraps a payload slice.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], SnapshotError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                SnapshotError::Corrupt(format!(
                    "truncated: need {n} bytes at offset {}, have {}",
                    self.pos,
                    self.buf.len().saturating_sub(self.pos)
                ))
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Corrupt`] on truncation.
    pub fn u8(&mut self) -> Result<u8, SnapshotError> {
        Ok(self.take(1)?[0])
    }

    /// Reads a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Corrupt`] on truncation.
    pub fn u32(&mut self) -> Result<u32, SnapshotError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a little-endian `u64`.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Corrupt`] on truncation.
    pub fn u64(&mut self) -> Result<u64, SnapshotError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Reads a little-endian `f32`.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Corrupt`] on truncation.
    pub fn f32(&mut self) -> Result<f32, SnapshotError> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a length-prefixed byte string.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Corrupt`] on truncation.
    pub fn bytes(&mut self) -> Result<Vec<u8>, SnapshotError> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// Reads a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Corrupt`] on truncation or invalid UTF-8.
    pub fn str(&mut self) -> Result<String, SnapshotError> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes).map_err(|_| SnapshotError::Corrupt("non-UTF-8 string".into()))
    }

    /// Reads `n` consecutive little-endian `f32`s.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Corrupt`] on truncation.
    pub fn f32_array(&mut self, n: usize) -> Result<Vec<f32>, SnapshotError> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.f32()?);
        }
        Ok(out)
    }

    /// Returns `true` when the whole payload has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.pos == self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let mut payload = Vec::new();
        put_u32(&mut payload, 42);
        put_str(&mut payload, "hello");
        let blob = seal(payload.clone());
        assert_eq!(open(&blob).unwrap(), payload.as_slice());
    }

    #[test]
    fn open_detects_corruption() {
        let mut blob = seal(vec![1, 2, 3, 4]);
        blob[1] ^= 0xFF;
        assert!(matches!(open(&blob), Err(SnapshotError::Corrupt(_))));
        assert!(matches!(open(&[0u8; 3]), Err(SnapshotError::Corrupt(_))));
    }

    #[test]
    fn reader_round_trips_primitives() {
        let mut buf = Vec::new();
        buf.push(7u8);
        put_u32(&mut buf, 1000);
        put_u64(&mut buf, u64::MAX);
        put_f32(&mut buf, -1.5);
        put_str(&mut buf, "id-1");
        put_bytes(&mut buf, &[9, 8, 7]);

        let mut r = Reader::new(&buf);
        assert_eq!(r.u8().unwrap(), 7);
        assert_eq!(r.u32().unwrap(), 1000);
        assert_eq!(r.u64().unwrap(), u64::MAX);
        assert_eq!(r.f32().unwrap(), -1.5);
        assert_eq!(r.str().unwrap(), "id-1");
        assert_eq!(r.bytes().unwrap(), vec![9, 8, 7]);
        assert!(r.is_exhausted());
    }

    #[test]
    fn reader_rejects_truncation() {
        let mut r = Reader::new(&[1, 2]);
        assert!(r.u32().is_err());
    }
}
