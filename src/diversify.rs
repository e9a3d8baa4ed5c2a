//! Result diversification.
//!
//! Four diversifiers over a scored candidate pool:
//!
//! - [`mmr`] — Maximal Marginal Relevance, `lambda`-weighted balance of
//!   relevance against similarity to already-selected items.
//! - [`dpp`] — greedy determinantal-point-process selection over the kernel
//!   `K_ii = quality_i`, `K_ij = sim(i, j) * sqrt(q_i * q_j)`.
//! - [`distance_floor`] — keeps items whose similarity to every selected
//!   item is below a floor.
//! - [`random_sample`] — seeded uniform sample, the cheapest spread.
//!
//! All selection is over the supplied pool only; callers over-fetch before
//! diversifying.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::metric::Similarity;
use crate::types::ScoredEmbedding;

/// Diversifier selection for a search request.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum DiversifyStrategy {
    /// MMR with the given relevance weight `lambda` in `[0, 1]`.
    Mmr {
        /// 1.0 = pure relevance, 0.0 = pure diversity.
        lambda: f32,
    },
    /// Greedy DPP.
    Dpp,
    /// Keep items whose similarity to every selected item is below `floor`.
    DistanceFloor {
        /// Similarity ceiling against the selected set.
        floor: f32,
    },
    /// Seeded uniform sample.
    Random {
        /// RNG seed, for reproducible sampling.
        seed: u64,
    },
}

/// Applies `strategy` to select `k` items from `pool`.
#[must_use]
pub fn diversify(
    pool: Vec<ScoredEmbedding>,
    k: usize,
    strategy: DiversifyStrategy,
    similarity: Similarity,
) -> Vec<ScoredEmbedding> {
    match strategy {
        DiversifyStrategy::Mmr { lambda } => mmr(pool, k, lambda, similarity),
        DiversifyStrategy::Dpp => dpp(pool, k, similarity),
        DiversifyStrategy::DistanceFloor { floor } => distance_floor(pool, k, floor, similarity),
        DiversifyStrategy::Random { seed } => random_sample(pool, k, seed),
    }
}

/// Maximal Marginal Relevance.
///
/// Seeds with the single most relevant item — without a diversity term, so
/// even `lambda = 0` anchors on the top hit — then repeatedly takes the item
/// maximizing `lambda * relevance - (1 - lambda) * max_sim_to_selected`.
/// At `lambda = 1` this degenerates to plain top-k by relevance.
#[must_use]
pub fn mmr(
    pool: Vec<ScoredEmbedding>,
    k: usize,
    lambda: f32,
    similarity: Similarity,
) -> Vec<ScoredEmbedding> {
    if pool.is_empty() || k == 0 {
        return Vec::new();
    }
    let lambda = lambda.clamp(0.0, 1.0);

    let mut remaining: Vec<ScoredEmbedding> = pool;
    let mut selected: Vec<ScoredEmbedding> = Vec::with_capacity(k);

    // Seed: top relevance.
    let first = argmax(&remaining, |item| item.score);
    selected.push(remaining.swap_remove(first));

    while selected.len() < k && !remaining.is_empty() {
        let best = argmax(&remaining, |item| {
            let max_sim = selected
                .iter()
                .map(|s| similarity.similarity(&item.embedding.vector, &s.embedding.vector))
                .fold(f32::MIN, f32::max);
            lambda * item.score - (1.0 - lambda) * max_sim
        });
        selected.push(remaining.swap_remove(best));
    }
    selected
}

/// Greedy DPP selection (fast greedy MAP inference over the quality/
/// similarity kernel). Each step takes the item with the largest remaining
/// conditional variance given the selected set.
#[must_use]
pub fn dpp(pool: Vec<ScoredEmbedding>, k: usize, similarity: Similarity) -> Vec<ScoredEmbedding> {
    let n = pool.len();
    if n == 0 || k == 0 {
        return Vec::new();
    }

    // Quality floor keeps the kernel positive semi-definite when scores go
    // non-positive (e.g. dot-product scores).
    let quality: Vec<f32> = pool.iter().map(|i| i.score.max(1e-6)).collect();
    let kernel = |i: usize, j: usize| -> f32 {
        if i == j {
            quality[i]
        } else {
            similarity.similarity(&pool[i].embedding.vector, &pool[j].embedding.vector)
                * (quality[i] * quality[j]).sqrt()
        }
    };

    // Incremental Cholesky row per item.
    let mut c: Vec<Vec<f32>> = vec![Vec::new(); n];
    let mut d2: Vec<f32> = (0..n).map(|i| kernel(i, i)).collect();
    let mut picked = vec![false; n];
    let mut order: Vec<usize> = Vec::with_capacity(k);

    for _ in 0..k.min(n) {
        let mut j = usize::MAX;
        let mut best = f32::MIN;
        for i in 0..n {
            if !picked[i] && d2[i] > best {
                best = d2[i];
                j = i;
            }
        }
        if j == usize::MAX || best <= 0.0 {
            break;
        }
        picked[j] = true;
        order.push(j);

        let dj = d2[j].sqrt();
        if dj <= f32::EPSILON {
            break;
        }
        let cj = c[j].clone();
        for i in 0..n {
            if picked[i] {
                continue;
            }
            let dot: f32 = cj.iter().zip(c[i].iter()).map(|(a, b)| a * b).sum();
            let e = (kernel(j, i) - dot) / dj;
            c[i].push(e);
            d2[i] -= e * e;
        }
    }

    let mut keep: Vec<Option<ScoredEmbedding>> = pool.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| keep[i].take())
        .collect()
}

/// Walks the pool in relevance order, keeping an item only when its
/// similarity to every already-kept item stays below `floor`.
#[must_use]
pub fn distance_floor(
    pool: Vec<ScoredEmbedding>,
    k: usize,
    floor: f32,
    similarity: Similarity,
) -> Vec<ScoredEmbedding> {
    let mut ordered = pool;
    ordered.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut selected: Vec<ScoredEmbedding> = Vec::with_capacity(k);
    for item in ordered {
        if selected.len() >= k {
            break;
        }
        let too_close = selected.iter().any(|s| {
            similarity.similarity(&item.embedding.vector, &s.embedding.vector) >= floor
        });
        if !too_close {
            selected.push(item);
        }
    }
    selected
}

/// Seeded uniform sample of `k` items.
#[must_use]
pub fn random_sample(pool: Vec<ScoredEmbedding>, k: usize, seed: u64) -> Vec<ScoredEmbedding> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut items = pool;
    items.shuffle(&mut rng);
    items.truncate(k);
    items
}

fn argmax<F: Fn(&ScoredEmbedding) -> f32>(items: &[ScoredEmbedding], score: F) -> usize {
    let mut best = 0usize;
    let mut best_score = f32::MIN;
    for (i, item) in items.iter().enumerate() {
        let s = score(item);
        if s > best_score {
            best_score = s;
            best = i;
        }
    }
    best
}
