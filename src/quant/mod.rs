//! Vector quantization.
//!
//! Compresses raw f32 vectors into compact byte codes and exposes an
//! approximate distance defined directly on the encoded form. Two families:
//!
//! - [`ScalarQuantizer`] — per-dimension min/range linear quantization at
//!   4, 6, or 8 bits per dimension.
//! - [`BinaryQuantizer`] — one bit per dimension, thresholded at the
//!   per-dimension median; Hamming distance as the dissimilarity proxy.
//!
//! The approximate distance is a monotonic proxy for the true distance, not
//! an exact reconstruction. When quantization is active the graph index drops
//! the raw vector after encoding; the backing store keeps the original.

mod binary;
mod scalar;

pub use binary::BinaryQuantizer;
pub use scalar::ScalarQuantizer;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metric::Similarity;
use crate::snapshot::{self, Reader, SnapshotError};

/// Quantizer failure modes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuantizerError {
    /// Training corpus was empty.
    #[error("quantizer training needs a non-empty corpus")]
    NeedsMoreData,

    /// Encode/decode attempted before training.
    #[error("quantizer is not trained")]
    NotTrained,

    /// Input vector length does not match the trained dimension.
    #[error("quantizer dimension mismatch: expected {expected}, got {actual}")]
    DimMismatch {
        /// Trained dimension.
        expected: usize,
        /// Offending vector length.
        actual: usize,
    },

    /// Bit width outside {4, 6, 8}.
    #[error("unsupported scalar quantizer bit width {0}")]
    UnsupportedBits(u8),
}

/// Quantizer selection in the store configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantizerKind {
    /// Scalar quantization at the given bit width (4, 6, or 8).
    Scalar {
        /// Bits per dimension.
        bits: u8,
    },
    /// One bit per dimension, median-thresholded.
    Binary,
}

/// A trained (or not-yet-trained) quantizer of either family.
#[derive(Clone, Debug, PartialEq)]
pub enum Quantizer {
    /// Scalar variant.
    Scalar(ScalarQuantizer),
    /// Binary variant.
    Binary(BinaryQuantizer),
}

impl Quantizer {
    const WIRE_VERSION: u8 = 1;
    const KIND_SCALAR: u8 = 0;
    const KIND_BINARY: u8 = 1;

    /// Creates an untrained quantizer of the requested kind for dimension
    /// `dims`.
    ///
    /// # Errors
    ///
    /// [`QuantizerError::UnsupportedBits`] for a scalar width outside
    /// {4, 6, 8}.
    pub fn new(kind: QuantizerKind, dims: usize) -> Result<Self, QuantizerError> {
        match kind {
            QuantizerKind::Scalar { bits } => {
                Ok(Quantizer::Scalar(ScalarQuantizer::new(dims, bits)?))
            }
            QuantizerKind::Binary => Ok(Quantizer::Binary(BinaryQuantizer::new(dims))),
        }
    }

    /// The configured kind.
    #[must_use]
    pub fn kind(&self) -> QuantizerKind {
        match self {
            Quantizer::Scalar(q) => QuantizerKind::Scalar { bits: q.bits() },
            Quantizer::Binary(_) => QuantizerKind::Binary,
        }
    }

    /// Trained dimension.
    #[must_use]
    pub fn dims(&self) -> usize {
        match self {
            Quantizer::Scalar(q) => q.dims(),
            Quantizer::Binary(q) => q.dims(),
        }
    }

    /// Whether [`Quantizer::train`] has completed. The flag transitions
    /// exactly once per lifetime.
    #[must_use]
    pub fn is_trained(&self) -> bool {
        match self {
            Quantizer::Scalar(q) => q.is_trained(),
            Quantizer::Binary(q) => q.is_trained(),
        }
    }

    /// Trains on a corpus of raw vectors.
    ///
    /// # Errors
    ///
    /// [`QuantizerError::NeedsMoreData`] if the corpus is empty;
    /// [`QuantizerError::DimMismatch`] if any vector has the wrong length.
    pub fn train(&mut self, vectors: &[Vec<f32>]) -> Result<(), QuantizerError> {
        match self {
            Quantizer::Scalar(q) => q.train(vectors),
            Quantizer::Binary(q) => q.train(vectors),
        }
    }

    /// Encodes a raw vector to its packed code.
    ///
    /// # Errors
    ///
    /// [`QuantizerError::NotTrained`] before training;
    /// [`QuantizerError::DimMismatch`] on length mismatch.
    pub fn encode(&self, vector: &[f32]) -> Result<Vec<u8>, QuantizerError> {
        match self {
            Quantizer::Scalar(q) => q.encode(vector),
            Quantizer::Binary(q) => q.encode(vector),
        }
    }

    /// Decodes a packed code back to an approximate vector.
    ///
    /// # Errors
    ///
    /// [`QuantizerError::NotTrained`] before training.
    pub fn decode(&self, code: &[u8]) -> Result<Vec<f32>, QuantizerError> {
        match self {
            Quantizer::Scalar(q) => q.decode(code),
            Quantizer::Binary(q) => q.decode(code),
        }
    }

    /// Approximate dissimilarity between two encoded vectors.
    ///
    /// Scalar codes are decoded and compared under `similarity`'s distance;
    /// binary codes use Hamming distance directly (the `similarity` argument
    /// is ignored for binary, which is its own proxy).
    #[must_use]
    pub fn approx_distance(&self, a: &[u8], b: &[u8], similarity: Similarity) -> f32 {
        match self {
            Quantizer::Scalar(q) => q.approx_distance(a, b, similarity),
            Quantizer::Binary(q) => q.approx_distance(a, b),
        }
    }

    /// Serializes to the snapshot wire form: version byte, kind byte, dims
    /// (u32), bit width (u8), parameter arrays as f32 LE, trained byte.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(Self::WIRE_VERSION);
        match self {
            Quantizer::Scalar(q) => {
                buf.push(Self::KIND_SCALAR);
                snapshot::put_u32(&mut buf, q.dims() as u32);
                buf.push(q.bits());
                // The trained byte trails the arrays, so an untrained
                // instance writes zero-filled arrays to keep the layout
                // fixed-width per dimension.
                put_array_or_zeros(&mut buf, q.min(), q.dims());
                put_array_or_zeros(&mut buf, q.range(), q.dims());
                buf.push(u8::from(q.is_trained()));
            }
            Quantizer::Binary(q) => {
                buf.push(Self::KIND_BINARY);
                snapshot::put_u32(&mut buf, q.dims() as u32);
                buf.push(1);
                put_array_or_zeros(&mut buf, q.thresholds(), q.dims());
                buf.push(u8::from(q.is_trained()));
            }
        }
        buf
    }

    /// Reverses [`Quantizer::to_bytes`].
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Version`] for an unknown version byte;
    /// [`SnapshotError::Corrupt`] for structural failures.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let mut r = Reader::new(bytes);
        let version = r.u8()?;
        if version != Self::WIRE_VERSION {
            return Err(SnapshotError::Version(version));
        }
        let kind = r.u8()?;
        let dims = r.u32()? as usize;
        let bits = r.u8()?;
        match kind {
            Self::KIND_SCALAR => {
                let min = r.f32_array(dims)?;
                let range = r.f32_array(dims)?;
                let trained = r.u8()? != 0;
                let (min, range) = if trained {
                    (min, range)
                } else {
                    (Vec::new(), Vec::new())
                };
                let q = ScalarQuantizer::from_parts(dims, bits, min, range, trained)
                    .map_err(|e| SnapshotError::Corrupt(e.to_string()))?;
                Ok(Quantizer::Scalar(q))
            }
            Self::KIND_BINARY => {
                let thresholds = r.f32_array(dims)?;
                let trained = r.u8()? != 0;
                let thresholds = if trained { thresholds } else { Vec::new() };
                Ok(Quantizer::Binary(BinaryQuantizer::from_parts(
                    dims, thresholds, trained,
                )))
            }
            other => Err(SnapshotError::Corrupt(format!(
                "unknown quantizer kind {other}"
            ))),
        }
    }
}

fn put_array_or_zeros(buf: &mut Vec<u8>, values: &[f32], dims: usize) {
    if values.len() == dims {
        for &v in values {
            snapshot::put_f32(buf, v);
        }
    } else {
        for _ in 0..dims {
            snapshot::put_f32(buf, 0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(dims: usize, n: usize) -> Vec<Vec<f32>> {
        (0..n)
            .map(|i| (0..dims).map(|d| ((i * 7 + d * 13) % 29) as f32 / 29.0).collect())
            .collect()
    }

    #[test]
    fn train_flags_flip_once() {
        let mut q = Quantizer::new(QuantizerKind::Scalar { bits: 8 }, 8).unwrap();
        assert!(!q.is_trained());
        q.train(&corpus(8, 10)).unwrap();
        assert!(q.is_trained());
    }

    #[test]
    fn empty_corpus_needs_more_data() {
        let mut q = Quantizer::new(QuantizerKind::Binary, 4).unwrap();
        assert_eq!(q.train(&[]), Err(QuantizerError::NeedsMoreData));
    }

    #[test]
    fn encode_before_train_fails() {
        let q = Quantizer::new(QuantizerKind::Scalar { bits: 4 }, 4).unwrap();
        assert_eq!(q.encode(&[0.0; 4]), Err(QuantizerError::NotTrained));
    }

    #[test]
    fn wire_round_trip_scalar() {
        let mut q = Quantizer::new(QuantizerKind::Scalar { bits: 6 }, 5).unwrap();
        q.train(&corpus(5, 20)).unwrap();
        let restored = Quantizer::from_bytes(&q.to_bytes()).unwrap();
        assert_eq!(q, restored);
    }

    #[test]
    fn wire_round_trip_binary() {
        let mut q = Quantizer::new(QuantizerKind::Binary, 6).unwrap();
        q.train(&corpus(6, 9)).unwrap();
        let restored = Quantizer::from_bytes(&q.to_bytes()).unwrap();
        assert_eq!(q, restored);
    }

    #[test]
    fn wire_round_trip_untrained() {
        for kind in [QuantizerKind::Scalar { bits: 4 }, QuantizerKind::Binary] {
            let q = Quantizer::new(kind, 7).unwrap();
            let restored = Quantizer::from_bytes(&q.to_bytes()).unwrap();
            assert_eq!(q, restored);
            assert!(!restored.is_trained());
        }
    }

    #[test]
    fn wire_rejects_future_version() {
        let mut bytes = Quantizer::new(QuantizerKind::Binary, 2).unwrap().to_bytes();
        bytes[0] = 99;
        assert_eq!(
            Quantizer::from_bytes(&bytes),
            Err(SnapshotError::Version(99))
        );
    }
}
