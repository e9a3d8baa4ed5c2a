//! MMR diversity reranker.

use super::{Reranker, RerankContext};
use crate::diversify;
use crate::types::ScoredEmbedding;

/// Reorders the full candidate list by Maximal Marginal Relevance.
///
/// Unlike the planner's diversifier (which selects `k` of a pool), this
/// reranker keeps every item and only changes the order, so downstream
/// truncation still sees the whole list.
#[derive(Debug, Clone, Copy)]
pub struct MmrReranker {
    lambda: f32,
}

impl MmrReranker {
    /// Creates a reranker with the given relevance weight in `[0, 1]`.
    #[must_use]
    pub fn new(lambda: f32) -> Self {
        Self { lambda }
    }
}

impl Reranker for MmrReranker {
    fn name(&self) -> &'static str {
        "mmr-diversity"
    }

    fn rerank(
        &self,
        ctx: &RerankContext<'_>,
        items: Vec<ScoredEmbedding>,
    ) -> Vec<ScoredEmbedding> {
        let n = items.len();
        diversify::mmr(items, n, self.lambda, ctx.similarity)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::item;
    use super::*;
    use crate::metric::Similarity;

    #[test]
    fn near_duplicate_is_pushed_down_but_kept() {
        let ctx = RerankContext {
            query_text: None,
            query_vector: &[1.0, 0.0, 0.0],
            similarity: Similarity::Cosine,
        };
        let items = vec![
            item("a", vec![1.0, 0.0, 0.0], 0.9),
            item("dup", vec![0.99, 0.01, 0.0], 0.88),
            item("c", vec![0.0, 1.0, 0.0], 0.7),
        ];
        let out = MmrReranker::new(0.5).rerank(&ctx, items);
        let ids: Vec<&str> = out.iter().map(|i| i.embedding.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "dup"]);
        assert_eq!(out.len(), 3, "diversity rerank must not drop items");
    }
}
