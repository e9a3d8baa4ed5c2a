//! Reciprocal Rank Fusion.
//!
//! RRF combines ranked lists by position, not score values:
//! `rrf(d) = sum_r 1 / (K + rank_r(d))` over each ranking `r` that contains
//! `d`. Items present in only one ranking contribute only that term — the
//! fused result is the *union* of the inputs, never an intersection.
//!
//! Reference: Cormack, Clarke, Buettcher (2009), "Reciprocal Rank Fusion
//! outperforms Condorcet and individual Rank Learning Methods", SIGIR.

use std::collections::HashMap;

/// Standard RRF smoothing constant from the original paper. Higher values
/// flatten the contribution of top ranks.
pub const RRF_DEFAULT_K: u32 = 60;

/// One fused hit with its provenance ranks (1-indexed; `None` when the item
/// was absent from that ranking).
#[derive(Clone, Debug, PartialEq)]
pub struct FusedHit {
    /// Item id.
    pub id: String,
    /// Combined RRF score.
    pub score: f32,
    /// Rank in the vector result list.
    pub vector_rank: Option<usize>,
    /// Rank in the keyword result list.
    pub keyword_rank: Option<usize>,
}

/// Fuses a vector ranking and a keyword ranking into a single RRF-ordered
/// list over their union.
///
/// Inputs are id lists ordered best-first; only positions matter. Ties in
/// fused score break by id so the output is deterministic. Fusing is
/// symmetric in its two inputs up to that provenance labeling: swapping them
/// yields the same fused set and scores.
#[must_use]
pub fn fuse(vector: &[String], keyword: &[String], k: u32, top_n: usize) -> Vec<FusedHit> {
    let mut hits: HashMap<&str, FusedHit> = HashMap::with_capacity(vector.len() + keyword.len());

    for (i, id) in vector.iter().enumerate() {
        let rank = i + 1;
        let entry = hits.entry(id.as_str()).or_insert_with(|| FusedHit {
            id: id.clone(),
            score: 0.0,
            vector_rank: None,
            keyword_rank: None,
        });
        if entry.vector_rank.is_none() {
            entry.vector_rank = Some(rank);
            entry.score += rrf_term(k, rank);
        }
    }

    for (i, id) in keyword.iter().enumerate() {
        let rank = i + 1;
        let entry = hits.entry(id.as_str()).or_insert_with(|| FusedHit {
            id: id.clone(),
            score: 0.0,
            vector_rank: None,
            keyword_rank: None,
        });
        if entry.keyword_rank.is_none() {
            entry.keyword_rank = Some(rank);
            entry.score += rrf_term(k, rank);
        }
    }

    let mut fused: Vec<FusedHit> = hits.into_values().collect();
    fused.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.id.cmp(&b.id))
    });
    fused.truncate(top_n);
    fused
}

/// Weighted RRF over any number of rankings: each list contributes
/// `weight / (K + rank)`.
///
/// Used by the RRF reranker to blend intrinsic vector ranks with a
/// text-overlap ranking under caller-supplied weights.
#[must_use]
pub fn fuse_weighted(rankings: &[(&[String], f32)], k: u32) -> HashMap<String, f32> {
    let mut scores: HashMap<String, f32> = HashMap::new();
    for (ranking, weight) in rankings {
        for (i, id) in ranking.iter().enumerate() {
            *scores.entry(id.clone()).or_insert(0.0) += weight * rrf_term(k, i + 1);
        }
    }
    scores
}

fn rrf_term(k: u32, rank: usize) -> f32 {
    1.0 / (k as f32 + rank as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn items_in_both_lists_outrank_singletons() {
        let vector = ids(&["a", "b", "c"]);
        let keyword = ids(&["b", "d"]);
        let fused = fuse(&vector, &keyword, RRF_DEFAULT_K, 10);
        assert_eq!(fused[0].id, "b");
        assert_eq!(fused[0].vector_rank, Some(2));
        assert_eq!(fused[0].keyword_rank, Some(1));
    }

    #[test]
    fn union_semantics_keep_single_list_items() {
        let vector = ids(&["a"]);
        let keyword = ids(&["z"]);
        let fused = fuse(&vector, &keyword, RRF_DEFAULT_K, 10);
        let got: Vec<&str> = fused.iter().map(|h| h.id.as_str()).collect();
        assert!(got.contains(&"a"));
        assert!(got.contains(&"z"));
    }

    #[test]
    fn fusion_is_symmetric() {
        let one = ids(&["a", "b", "c"]);
        let two = ids(&["c", "d"]);
        let forward = fuse(&one, &two, RRF_DEFAULT_K, 10);
        let backward = fuse(&two, &one, RRF_DEFAULT_K, 10);

        let f: Vec<(&str, f32)> = forward.iter().map(|h| (h.id.as_str(), h.score)).collect();
        let b: Vec<(&str, f32)> = backward.iter().map(|h| (h.id.as_str(), h.score)).collect();
        assert_eq!(f, b);
    }

    #[test]
    fn top_n_truncates() {
        let vector = ids(&["a", "b", "c", "d"]);
        let fused = fuse(&vector, &[], RRF_DEFAULT_K, 2);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].id, "a");
    }

    #[test]
    fn weighted_fusion_scales_contributions() {
        let primary = ids(&["a", "b"]);
        let secondary = ids(&["b", "a"]);
        let scores = fuse_weighted(&[(&primary, 1.0), (&secondary, 0.0)], RRF_DEFAULT_K);
        assert!(scores["a"] > scores["b"]);
    }
}
