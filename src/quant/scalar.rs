//! Scalar quantization (SQ-N).
//!
//! Per-dimension min/range linear quantization. Training scans the corpus for
//! each dimension's minimum and maximum; encoding maps each component to an
//! N-bit code:
//!
//! `q_i = clamp(round((v_i - min_i) / range_i * (2^N - 1)), 0, 2^N - 1)`
//!
//! Codes are packed LSB-first into `ceil(D * N / 8)` bytes.

use crate::metric::Similarity;

use super::QuantizerError;

/// Supported bit widths.
const SUPPORTED_BITS: [u8; 3] = [4, 6, 8];

/// Per-dimension linear quantizer at 4, 6, or 8 bits.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarQuantizer {
    dims: usize,
    bits: u8,
    min: Vec<f32>,
    range: Vec<f32>,
    trained: bool,
}

impl ScalarQuantizer {
    /// Creates an untrained quantizer.
    ///
    /// # Errors
    ///
    /// [`QuantizerError::UnsupportedBits`] for a width outside {4, 6, 8}.
    pub fn new(dims: usize, bits: u8) -> Result<Self, QuantizerError> {
        if !SUPPORTED_BITS.contains(&bits) {
            return Err(QuantizerError::UnsupportedBits(bits));
        }
        Ok(Self {
            dims,
            bits,
            min: Vec::new(),
            range: Vec::new(),
            trained: false,
        })
    }

    /// Reassembles a quantizer from snapshot parts.
    ///
    /// # Errors
    ///
    /// [`QuantizerError::UnsupportedBits`] for an invalid width.
    pub fn from_parts(
        dims: usize,
        bits: u8,
        min: Vec<f32>,
        range: Vec<f32>,
        trained: bool,
    ) -> Result<Self, QuantizerError> {
        if !SUPPORTED_BITS.contains(&bits) {
            return Err(QuantizerError::UnsupportedBits(bits));
        }
        Ok(Self {
            dims,
            bits,
            min,
            range,
            trained,
        })
    }

    /// Trained dimension.
    #[must_use]
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Bits per dimension.
    #[must_use]
    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Per-dimension minima (empty before training).
    #[must_use]
    pub fn min(&self) -> &[f32] {
        &self.min
    }

    /// Per-dimension ranges (`max - min`; empty before training).
    #[must_use]
    pub fn range(&self) -> &[f32] {
        &self.range
    }

    /// Whether training has completed.
    #[must_use]
    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Number of code levels: `2^N - 1` as f32.
    fn levels(&self) -> f32 {
        ((1u32 << self.bits) - 1) as f32
    }

    /// Encoded length in bytes: `ceil(D * N / 8)`.
    #[must_use]
    pub fn code_len(&self) -> usize {
        (self.dims * self.bits as usize + 7) / 8
    }

    /// Scans the corpus for per-dimension min/max.
    ///
    /// # Errors
    ///
    /// [`QuantizerError::NeedsMoreData`] for an empty corpus;
    /// [`QuantizerError::DimMismatch`] if any vector has the wrong length.
    pub fn train(&mut self, vectors: &[Vec<f32>]) -> Result<(), QuantizerError> {
        if vectors.is_empty() {
            return Err(QuantizerError::NeedsMoreData);
        }
        for v in vectors {
            if v.len() != self.dims {
                return Err(QuantizerError::DimMismatch {
                    expected: self.dims,
                    actual: v.len(),
                });
            }
        }

        let mut min = vec![f32::MAX; self.dims];
        let mut max = vec![f32::MIN; self.dims];
        for v in vectors {
            for (d, &x) in v.iter().enumerate() {
                if x < min[d] {
                    min[d] = x;
                }
                if x > max[d] {
                    max[d] = x;
                }
            }
        }

        self.range = min
            .iter()
            .zip(max.iter())
            .map(|(lo, hi)| (hi - lo).max(0.0))
            .collect();
        self.min = min;
        self.trained = true;
        Ok(())
    }

    /// Encodes a vector into its packed N-bit code.
    ///
    /// # Errors
    ///
    /// [`QuantizerError::NotTrained`] before training;
    /// [`QuantizerError::DimMismatch`] on length mismatch.
    pub fn encode(&self, vector: &[f32]) -> Result<Vec<u8>, QuantizerError> {
        if !self.trained {
            return Err(QuantizerError::NotTrained);
        }
        if vector.len() != self.dims {
            return Err(QuantizerError::DimMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }

        let levels = self.levels();
        let mut packer = BitPacker::new(self.code_len());
        for (d, &x) in vector.iter().enumerate() {
            let code = if self.range[d] <= f32::EPSILON {
                0u32
            } else {
                let norm = (x - self.min[d]) / self.range[d] * levels;
                norm.round().clamp(0.0, levels) as u32
            };
            packer.push(code, self.bits);
        }
        Ok(packer.finish())
    }

    /// Decodes a packed code to the approximate midpoint reconstruction.
    ///
    /// # Errors
    ///
    /// [`QuantizerError::NotTrained`] before training.
    pub fn decode(&self, code: &[u8]) -> Result<Vec<f32>, QuantizerError> {
        if !self.trained {
            return Err(QuantizerError::NotTrained);
        }
        let levels = self.levels();
        let mut unpacker = BitUnpacker::new(code);
        let mut out = Vec::with_capacity(self.dims);
        for d in 0..self.dims {
            let q = unpacker.pull(self.bits) as f32;
            out.push(self.min[d] + q / levels * self.range[d]);
        }
        Ok(out)
    }

    /// Approximate distance: decode both codes and compare under the given
    /// metric. Monotonic in the true distance, not exact.
    #[must_use]
    pub fn approx_distance(&self, a: &[u8], b: &[u8], similarity: Similarity) -> f32 {
        match (self.decode(a), self.decode(b)) {
            (Ok(da), Ok(db)) => similarity.distance(&da, &db),
            // Untrained quantizers never hand out codes, so this arm is
            // unreachable in practice; order the pair last if it happens.
            _ => f32::MAX,
        }
    }
}

/// LSB-first bit packer.
struct BitPacker {
    buf: Vec<u8>,
    acc: u64,
    filled: u32,
}

impl BitPacker {
    fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            acc: 0,
            filled: 0,
        }
    }

    fn push(&mut self, code: u32, bits: u8) {
        self.acc |= u64::from(code) << self.filled;
        self.filled += u32::from(bits);
        while self.filled >= 8 {
            self.buf.push((self.acc & 0xFF) as u8);
            self.acc >>= 8;
            self.filled -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.buf.push((self.acc & 0xFF) as u8);
        }
        self.buf
    }
}

/// LSB-first bit unpacker.
struct BitUnpacker<'a> {
    data: &'a [u8],
    pos: usize,
    acc: u64,
    filled: u32,
}

impl<'a> BitUnpacker<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            acc: 0,
            filled: 0,
        }
    }

    fn pull(&mut self, bits: u8) -> u32 {
        while self.filled < u32::from(bits) {
            let byte = self.data.get(self.pos).copied().unwrap_or(0);
            self.acc |= u64::from(byte) << self.filled;
            self.pos += 1;
            self.filled += 8;
        }
        let mask = (1u64 << bits) - 1;
        let code = (self.acc & mask) as u32;
        self.acc >>= bits;
        self.filled -= u32::from(bits);
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained(dims: usize, bits: u8) -> ScalarQuantizer {
        let corpus: Vec<Vec<f32>> = (0..50)
            .map(|i| (0..dims).map(|d| ((i + d) % 10) as f32).collect())
            .collect();
        let mut q = ScalarQuantizer::new(dims, bits).unwrap();
        q.train(&corpus).unwrap();
        q
    }

    #[test]
    fn rejects_odd_bit_widths() {
        assert!(ScalarQuantizer::new(8, 5).is_err());
        assert!(ScalarQuantizer::new(8, 16).is_err());
        for bits in [4u8, 6, 8] {
            assert!(ScalarQuantizer::new(8, bits).is_ok());
        }
    }

    #[test]
    fn code_len_is_ceil() {
        assert_eq!(ScalarQuantizer::new(128, 8).unwrap().code_len(), 128);
        assert_eq!(ScalarQuantizer::new(128, 4).unwrap().code_len(), 64);
        assert_eq!(ScalarQuantizer::new(10, 6).unwrap().code_len(), 8); // 60 bits
    }

    #[test]
    fn reconstruction_error_bounded_by_step() {
        for bits in [4u8, 6, 8] {
            let q = trained(16, bits);
            let v: Vec<f32> = (0..16).map(|d| (d % 10) as f32 * 0.93).collect();
            let decoded = q.decode(&q.encode(&v).unwrap()).unwrap();
            let levels = ((1u32 << bits) - 1) as f32;
            for d in 0..16 {
                let step = q.range()[d] / levels;
                let err = (v[d].clamp(q.min()[d], q.min()[d] + q.range()[d]) - decoded[d]).abs();
                assert!(
                    err <= step / 2.0 + 1e-4,
                    "bits={bits} dim={d}: err {err} > step {step}"
                );
            }
        }
    }

    #[test]
    fn constant_dimension_encodes_to_zero() {
        let corpus = vec![vec![5.0, 1.0], vec![5.0, 2.0]];
        let mut q = ScalarQuantizer::new(2, 8).unwrap();
        q.train(&corpus).unwrap();
        let code = q.encode(&[5.0, 1.5]).unwrap();
        let decoded = q.decode(&code).unwrap();
        assert!((decoded[0] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn approx_distance_is_monotonic_proxy() {
        let q = trained(8, 8);
        let origin = vec![0.0f32; 8];
        let near = vec![1.0f32; 8];
        let far = vec![9.0f32; 8];
        let e_origin = q.encode(&origin).unwrap();
        let e_near = q.encode(&near).unwrap();
        let e_far = q.encode(&far).unwrap();
        let d_near = q.approx_distance(&e_origin, &e_near, Similarity::Euclidean);
        let d_far = q.approx_distance(&e_origin, &e_far, Similarity::Euclidean);
        assert!(d_near < d_far);
    }

    #[test]
    fn encode_checks_dims() {
        let q = trained(4, 8);
        assert_eq!(
            q.encode(&[0.0; 3]),
            Err(QuantizerError::DimMismatch {
                expected: 4,
                actual: 3
            })
        );
    }
}
