//! k-means training for the IVF partitioner.
//!
//! k-means++ seeding followed by Lloyd iterations, stopping on assignment
//! stability or the iteration bound. Empty clusters are reseeded from a
//! random sample point.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::cancel::CancelToken;
use crate::metric::Similarity;

use super::IvfError;

/// Runs k-means over `sample`, returning `k` centroids.
///
/// The caller guarantees `sample.len() >= k` and uniform dimensionality.
///
/// # Errors
///
/// [`IvfError::Cancelled`] when the token fires between iterations.
pub(crate) fn kmeans(
    sample: &[Vec<f32>],
    k: usize,
    max_iterations: usize,
    similarity: Similarity,
    rng: &mut ChaCha8Rng,
    cancel: &CancelToken,
) -> Result<Vec<Vec<f32>>, IvfError> {
    debug_assert!(sample.len() >= k && k > 0);
    let dims = sample[0].len();

    let mut centroids = seed_plus_plus(sample, k, similarity, rng);
    let mut assignment = vec![usize::MAX; sample.len()];

    for _ in 0..max_iterations {
        if cancel.is_cancelled() {
            return Err(IvfError::Cancelled);
        }

        // Assignment step.
        let mut changed = false;
        for (i, v) in sample.iter().enumerate() {
            let nearest = nearest_centroid(v, &centroids, similarity);
            if assignment[i] != nearest {
                assignment[i] = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        // Update step: arithmetic mean per cell.
        let mut sums = vec![vec![0.0f32; dims]; k];
        let mut counts = vec![0usize; k];
        for (i, v) in sample.iter().enumerate() {
            let c = assignment[i];
            counts[c] += 1;
            for (d, &x) in v.iter().enumerate() {
                sums[c][d] += x;
            }
        }
        for c in 0..k {
            if counts[c] == 0 {
                // Reseed a starved cell from a random sample point.
                let pick = rng.gen_range(0..sample.len());
                centroids[c] = sample[pick].clone();
                continue;
            }
            for d in 0..dims {
                centroids[c][d] = sums[c][d] / counts[c] as f32;
            }
        }
    }

    Ok(centroids)
}

/// Index of the centroid nearest to `v`.
pub(crate) fn nearest_centroid(v: &[f32], centroids: &[Vec<f32>], similarity: Similarity) -> usize {
    let mut best = 0usize;
    let mut best_dist = f32::MAX;
    for (i, c) in centroids.iter().enumerate() {
        let d = similarity.distance(v, c);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// k-means++ seeding: first centroid uniform, each next proportional to the
/// squared distance to its nearest already-chosen centroid.
fn seed_plus_plus(
    sample: &[Vec<f32>],
    k: usize,
    similarity: Similarity,
    rng: &mut ChaCha8Rng,
) -> Vec<Vec<f32>> {
    let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k);
    let first = rng.gen_range(0..sample.len());
    centroids.push(sample[first].clone());

    let mut nearest_sq: Vec<f32> = sample
        .iter()
        .map(|v| {
            let d = similarity.distance(v, &centroids[0]);
            d * d
        })
        .collect();

    while centroids.len() < k {
        let total: f32 = nearest_sq.iter().sum();
        let pick = if total <= f32::EPSILON {
            // Degenerate corpus (all points coincide with a centroid).
            rng.gen_range(0..sample.len())
        } else {
            let mut target = rng.gen_range(0.0..total);
            let mut chosen = sample.len() - 1;
            for (i, &w) in nearest_sq.iter().enumerate() {
                if target < w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        };
        centroids.push(sample[pick].clone());

        let newest = centroids.last().expect("just pushed");
        for (i, v) in sample.iter().enumerate() {
            let d = similarity.distance(v, newest);
            let sq = d * d;
            if sq < nearest_sq[i] {
                nearest_sq[i] = sq;
            }
        }
    }

    centroids
}
