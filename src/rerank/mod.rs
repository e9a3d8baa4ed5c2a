//! Reranker stack.
//!
//! A reranker consumes an ordered candidate list and returns a reordered
//! list, possibly with updated scores. The contract, which composition
//! ([`HybridReranker`]) depends on:
//!
//! - **pure**: no I/O, no interior state mutation;
//! - **deterministic**: identical inputs give identical outputs;
//! - **order-preserving when no change**: a reranker that assigns equal
//!   scores leaves the incoming order intact (all sorts are stable).
//!
//! Rerankers run after the planner's candidate materialization; reranked
//! searches over-fetch (5x) so post-rerank truncation has slack.

mod custom;
mod diversity;
mod keyword;
mod normalize;
mod rrf;

pub use custom::FnReranker;
pub use diversity::MmrReranker;
pub use keyword::KeywordBooster;
pub use normalize::ScoreNormalizer;
pub use rrf::RrfReranker;

use crate::metric::Similarity;
use crate::types::ScoredEmbedding;

/// Read-only query context handed to every reranker.
#[derive(Clone, Copy, Debug)]
pub struct RerankContext<'a> {
    /// The textual query, when the request carried one.
    pub query_text: Option<&'a str>,
    /// The (already dimension-adapted) query vector.
    pub query_vector: &'a [f32],
    /// The store's similarity function.
    pub similarity: Similarity,
}

/// A candidate-list transformer. See the module docs for the purity
/// contract.
pub trait Reranker: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Reorders (and possibly rescores) `items`.
    fn rerank(&self, ctx: &RerankContext<'_>, items: Vec<ScoredEmbedding>)
        -> Vec<ScoredEmbedding>;
}

/// Weighted blend of several rerankers.
///
/// Each component reranker rescopes the same input; an item's final score is
/// the weight-renormalized sum of its per-component scores. Items are then
/// stably re-sorted by the blended score.
pub struct HybridReranker {
    components: Vec<(Box<dyn Reranker>, f32)>,
}

impl HybridReranker {
    /// Builds a blend from `(reranker, weight)` pairs.
    #[must_use]
    pub fn new(components: Vec<(Box<dyn Reranker>, f32)>) -> Self {
        Self { components }
    }
}

impl Reranker for HybridReranker {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn rerank(
        &self,
        ctx: &RerankContext<'_>,
        items: Vec<ScoredEmbedding>,
    ) -> Vec<ScoredEmbedding> {
        let total_weight: f32 = self.components.iter().map(|(_, w)| w).sum();
        if total_weight <= f32::EPSILON || items.is_empty() {
            return items;
        }

        let mut blended: Vec<f32> = vec![0.0; items.len()];
        for (reranker, weight) in &self.components {
            let scored = reranker.rerank(ctx, items.clone());
            // Components may reorder; align contributions by id.
            for item in scored {
                if let Some(pos) = items
                    .iter()
                    .position(|orig| orig.embedding.id == item.embedding.id)
                {
                    blended[pos] += weight * item.score;
                }
            }
        }

        let mut out: Vec<ScoredEmbedding> = items
            .into_iter()
            .zip(blended)
            .map(|(mut item, score)| {
                item.score = score / total_weight;
                item
            })
            .collect();
        out.sort_by(|a, b| b.score.total_cmp(&a.score));
        out
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::item_with_content;
    use super::*;

    #[test]
    fn hybrid_blend_renormalizes_by_weight_sum() {
        let ctx = RerankContext {
            query_text: Some("alpha"),
            query_vector: &[1.0],
            similarity: Similarity::Cosine,
        };
        let items = vec![
            item_with_content("a", "alpha", 0.5),
            item_with_content("b", "beta", 0.5),
        ];

        // One boosting component with weight 2, one identity-ish with 0:
        // renormalization divides by 2.
        let hybrid = HybridReranker::new(vec![
            (Box::new(KeywordBooster::new(1.0)), 2.0),
            (Box::new(ScoreNormalizer::new(0.0, 1.0)), 0.0),
        ]);
        let out = hybrid.rerank(&ctx, items);
        assert_eq!(out[0].embedding.id, "a");
        assert!(out[0].score > out[1].score);
    }

    #[test]
    fn hybrid_with_zero_total_weight_is_identity() {
        let ctx = RerankContext {
            query_text: None,
            query_vector: &[1.0],
            similarity: Similarity::Cosine,
        };
        let items = vec![
            item_with_content("a", "", 0.1),
            item_with_content("b", "", 0.9),
        ];
        let hybrid = HybridReranker::new(vec![]);
        let out = hybrid.rerank(&ctx, items.clone());
        assert_eq!(out, items);
    }
}
