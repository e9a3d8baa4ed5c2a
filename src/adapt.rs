//! Dimension adaptation.
//!
//! Reconciles vectors whose length differs from the store's configured
//! dimension. The policy decides between rejecting, truncating, padding, or
//! magnitude-aware adaptation. Any adaptation that changes the length
//! renormalizes the result to unit length so similarity scores stay
//! comparable across adapted and native vectors.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::metric::normalize;

/// Policy for vectors that do not match the configured dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AdaptPolicy {
    /// Reject with [`StoreError::DimMismatch`].
    #[default]
    Strict,
    /// Drop trailing components; renormalize.
    AutoTruncate,
    /// Append zeros; renormalize.
    AutoPad,
    /// Keep the highest-magnitude components when truncating; pad with small
    /// Gaussian noise (sigma = 0.01 * component stddev) when extending.
    /// Renormalizes either way.
    SmartAdapt,
    /// Log a warning and pass the vector through unchanged.
    WarnOnly,
}

/// Adapts `vector` to `target` dimensions under `policy`.
///
/// Adapting a vector to its own dimension is the identity for every policy.
/// `SmartAdapt` uses the supplied RNG for pad noise so results are
/// reproducible under a seeded engine.
///
/// # Errors
///
/// [`StoreError::DimMismatch`] under [`AdaptPolicy::Strict`] when the lengths
/// differ.
pub fn adapt_vector(
    vector: &[f32],
    target: usize,
    policy: AdaptPolicy,
    rng: &mut ChaCha8Rng,
) -> Result<Vec<f32>> {
    if vector.len() == target {
        return Ok(vector.to_vec());
    }

    match policy {
        AdaptPolicy::Strict => Err(StoreError::DimMismatch {
            expected: target,
            actual: vector.len(),
        }),
        AdaptPolicy::WarnOnly => {
            log::warn!(
                "dimension mismatch left unadapted: expected {target}, got {}",
                vector.len()
            );
            Ok(vector.to_vec())
        }
        AdaptPolicy::AutoTruncate => {
            let mut out = if vector.len() > target {
                vector[..target].to_vec()
            } else {
                pad_zeros(vector, target)
            };
            normalize(&mut out);
            Ok(out)
        }
        AdaptPolicy::AutoPad => {
            let mut out = if vector.len() < target {
                pad_zeros(vector, target)
            } else {
                vector[..target].to_vec()
            };
            normalize(&mut out);
            Ok(out)
        }
        AdaptPolicy::SmartAdapt => {
            let mut out = if vector.len() > target {
                magnitude_truncate(vector, target)
            } else {
                noise_pad(vector, target, rng)
            };
            normalize(&mut out);
            Ok(out)
        }
    }
}

fn pad_zeros(vector: &[f32], target: usize) -> Vec<f32> {
    let mut out = vector.to_vec();
    out.resize(target, 0.0);
    out
}

/// Keeps the `target` highest-magnitude components, preserving their original
/// relative order.
fn magnitude_truncate(vector: &[f32], target: usize) -> Vec<f32> {
    let mut indexed: Vec<(usize, f32)> = vector.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    let mut keep: Vec<usize> = indexed.iter().take(target).map(|(i, _)| *i).collect();
    keep.sort_unstable();
    keep.into_iter().map(|i| vector[i]).collect()
}

/// Pads with Gaussian noise scaled to 1% of the existing component stddev.
fn noise_pad(vector: &[f32], target: usize, rng: &mut ChaCha8Rng) -> Vec<f32> {
    let mean = vector.iter().sum::<f32>() / vector.len() as f32;
    let var = vector
        .iter()
        .map(|x| {
            let d = x - mean;
            d * d
        })
        .sum::<f32>()
        / vector.len() as f32;
    let sigma = 0.01 * var.sqrt();

    let mut out = vector.to_vec();
    while out.len() < target {
        out.push(gaussian(rng) * sigma);
    }
    out
}

/// Standard normal sample via Box-Muller.
fn gaussian(rng: &mut ChaCha8Rng) -> f32 {
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
}
