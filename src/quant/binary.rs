//! Binary quantization.
//!
//! One bit per dimension: `b_i = 1 if v_i >= threshold_i else 0`, packed into
//! `ceil(D / 8)` bytes. Thresholds are the per-dimension medians of the
//! training corpus, which balances the bit population and keeps Hamming
//! distance a usable dissimilarity proxy.

use crate::metric::{Hamming, Metric};

use super::QuantizerError;

/// Median-thresholded one-bit-per-dimension quantizer.
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryQuantizer {
    dims: usize,
    thresholds: Vec<f32>,
    trained: bool,
}

impl BinaryQuantizer {
    /// Creates an untrained quantizer.
    #[must_use]
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            thresholds: Vec::new(),
            trained: false,
        }
    }

    /// Reassembles a quantizer from snapshot parts.
    #[must_use]
    pub fn from_parts(dims: usize, thresholds: Vec<f32>, trained: bool) -> Self {
        Self {
            dims,
            thresholds,
            trained,
        }
    }

    /// Trained dimension.
    #[must_use]
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Per-dimension thresholds (empty before training).
    #[must_use]
    pub fn thresholds(&self) -> &[f32] {
        &self.thresholds
    }

    /// Whether training has completed.
    #[must_use]
    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Encoded length in bytes: `ceil(D / 8)`.
    #[must_use]
    pub fn code_len(&self) -> usize {
        (self.dims + 7) / 8
    }

    /// Computes per-dimension medians over the corpus.
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

        let mut thresholds = Vec::with_capacity(self.dims);
        let mut column = Vec::with_capacity(vectors.len());
        for d in 0..self.dims {
            column.clear();
            column.extend(vectors.iter().map(|v| v[d]));
            column.sort_by(f32::total_cmp);
            let mid = column.len() / 2;
            let median = if column.len() % 2 == 0 {
                (column[mid - 1] + column[mid]) / 2.0
            } else {
                column[mid]
            };
            thresholds.push(median);
        }
        self.thresholds = thresholds;
        self.trained = true;
        Ok(())
    }

    /// Encodes a vector into packed sign bits.
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

        let mut code = vec![0u8; self.code_len()];
        for (d, &x) in vector.iter().enumerate() {
            if x >= self.thresholds[d] {
                code[d / 8] |= 1 << (d % 8);
            }
        }
        Ok(code)
    }

    /// Decodes a packed code to a coarse reconstruction: threshold plus or
    /// minus a unit step per bit. Only useful as a rough approximation.
    ///
    /// # Errors
    ///
    /// [`QuantizerError::NotTrained`] before training.
    pub fn decode(&self, code: &[u8]) -> Result<Vec<f32>, QuantizerError> {
        if !self.trained {
            return Err(QuantizerError::NotTrained);
        }
        let mut out = Vec::with_capacity(self.dims);
        for d in 0..self.dims {
            let bit = code.get(d / 8).copied().unwrap_or(0) >> (d % 8) & 1;
            let delta = if bit == 1 { 1.0 } else { -1.0 };
            out.push(self.thresholds[d] + delta);
        }
        Ok(out)
    }

    /// Hamming distance between two codes, used directly as dissimilarity.
    #[must_use]
    pub fn approx_distance(&self, a: &[u8], b: &[u8]) -> f32 {
        Hamming::distance(a, b)
    }
}
