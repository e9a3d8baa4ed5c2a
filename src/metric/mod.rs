//! Distance metrics and similarity functions.
//!
//! Two views of the same math live here:
//!
//! - The [`Metric`] trait with zero-sized implementations ([`Euclidean`],
//!   [`DotProduct`], [`CosineDistance`], [`Hamming`]) for code that is generic
//!   over the metric at compile time.
//! - The runtime [`Similarity`] enum used by the engine, which dispatches on a
//!   configured value and exposes both a similarity (higher = closer) and a
//!   dissimilarity (smaller = closer) view.
//!
//! The index layers only ever consume dissimilarities: cosine is exposed to
//! them as `1 - cosine_similarity`, dot product as its negation.

mod cosine;
mod dot;
mod hamming;
mod l2;

pub use cosine::CosineDistance;
pub use dot::DotProduct;
pub use hamming::Hamming;
pub use l2::Euclidean;

use serde::{Deserialize, Serialize};

/// A distance function over slices of element type `T`.
///
/// Implementations must return a dissimilarity: smaller values mean the
/// arguments are closer.
pub trait Metric<T> {
    /// Computes the distance between `a` and `b`.
    ///
    /// Both slices must have the same length.
    fn distance(a: &[T], b: &[T]) -> f32;
}

/// Similarity function selection for a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Similarity {
    /// Cosine similarity (default). Distance form is `1 - cos(a, b)`.
    #[default]
    Cosine,
    /// Dot product. Distance form is `-dot(a, b)`.
    Dot,
    /// Euclidean distance. Similarity form is `-l2(a, b)`.
    Euclidean,
}

impl Similarity {
    /// Stable one-byte code used by the snapshot codec.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Similarity::Cosine => 0,
            Similarity::Dot => 1,
            Similarity::Euclidean => 2,
        }
    }

    /// Reverses [`Similarity::code`].
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Similarity::Cosine),
            1 => Some(Similarity::Dot),
            2 => Some(Similarity::Euclidean),
            _ => None,
        }
    }

    /// Similarity between two vectors: higher means closer.
    #[must_use]
    pub fn similarity(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Similarity::Cosine => cosine_similarity(a, b),
            Similarity::Dot => dot(a, b),
            Similarity::Euclidean => -Euclidean::distance(a, b),
        }
    }

    /// Dissimilarity between two vectors: smaller means closer.
    #[must_use]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Similarity::Cosine => CosineDistance::distance(a, b),
            Similarity::Dot => DotProduct::distance(a, b),
            Similarity::Euclidean => Euclidean::distance(a, b),
        }
    }

    /// Converts a dissimilarity produced by [`Similarity::distance`] back to
    /// the similarity view.
    #[must_use]
    pub fn similarity_from_distance(self, distance: f32) -> f32 {
        match self {
            Similarity::Cosine => 1.0 - distance,
            Similarity::Dot | Similarity::Euclidean => -distance,
        }
    }
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub(crate) fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let denom = norm(a) * norm(b);
    if denom <= f32::EPSILON {
        return 0.0;
    }
    dot(a, b) / denom
}

/// Scales `v` in place to unit length. A zero vector is left untouched.
pub(crate) fn normalize(v: &mut [f32]) {
    let n = norm(v);
    if n > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_is_one() {
        let v = vec![0.6, 0.8, 0.0];
        assert!((Similarity::Cosine.similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(Similarity::Cosine.distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(Similarity::Cosine.similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn dot_distance_is_negated() {
        let a = vec![1.0, 2.0];
        let b = vec![3.0, 4.0];
        assert!((Similarity::Dot.similarity(&a, &b) - 11.0).abs() < 1e-6);
        assert!((Similarity::Dot.distance(&a, &b) + 11.0).abs() < 1e-6);
    }

    #[test]
    fn euclidean_distance_matches_hand_computation() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((Similarity::Euclidean.distance(&a, &b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn similarity_distance_round_trip() {
        let a = vec![0.3, 0.7, 0.1];
        let b = vec![0.2, 0.5, 0.9];
        for sim in [Similarity::Cosine, Similarity::Dot, Similarity::Euclidean] {
            let d = sim.distance(a.as_slice(), b.as_slice());
            let s = sim.similarity_from_distance(d);
            assert!((s - sim.similarity(&a, &b)).abs() < 1e-5);
        }
    }

    #[test]
    fn code_round_trip() {
        for sim in [Similarity::Cosine, Similarity::Dot, Similarity::Euclidean] {
            assert_eq!(Similarity::from_code(sim.code()), Some(sim));
        }
        assert_eq!(Similarity::from_code(9), None);
    }

    #[test]
    fn normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((norm(&v) - 1.0).abs() < 1e-6);
    }
}
