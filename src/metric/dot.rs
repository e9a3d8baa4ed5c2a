//! Dot product metric.

use super::Metric;

/// Negated dot product.
///
/// The raw dot product is a similarity (higher = closer), so the metric view
/// negates it to satisfy the smaller-is-closer contract shared by all
/// [`Metric`] implementations.
#[derive(Debug, Clone, Copy, Default)]
pub struct DotProduct;

impl Metric<f32> for DotProduct {
    #[inline]
    fn distance(a: &[f32], b: &[f32]) -> f32 {
        -super::dot(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closer_vectors_have_smaller_distance() {
        let q = vec![1.0, 0.0];
        let near = vec![0.9, 0.1];
        let far = vec![0.1, 0.9];
        assert!(DotProduct::distance(&q, &near) < DotProduct::distance(&q, &far));
    }
}
