//! User-supplied scoring reranker.

use super::{Reranker, RerankContext};
use crate::types::ScoredEmbedding;

/// Applies a caller-provided scoring function to each candidate and re-sorts
/// by the new score.
///
/// The function must be pure: rerankers are assumed deterministic and free
/// of I/O so they compose under [`super::HybridReranker`].
pub struct FnReranker<F>
where
    F: Fn(&RerankContext<'_>, &ScoredEmbedding) -> f32 + Send + Sync,
{
    score_fn: F,
}

impl<F> FnReranker<F>
where
    F: Fn(&RerankContext<'_>, &ScoredEmbedding) -> f32 + Send + Sync,
{
    /// Wraps a scoring function.
    #[must_use]
    pub fn new(score_fn: F) -> Self {
        Self { score_fn }
    }
}

impl<F> Reranker for FnReranker<F>
where
    F: Fn(&RerankContext<'_>, &ScoredEmbedding) -> f32 + Send + Sync,
{
    fn name(&self) -> &'static str {
        "custom-fn"
    }

    fn rerank(
        &self,
        ctx: &RerankContext<'_>,
        mut items: Vec<ScoredEmbedding>,
    ) -> Vec<ScoredEmbedding> {
        for item in &mut items {
            item.score = (self.score_fn)(ctx, item);
        }
        items.sort_by(|a, b| b.score.total_cmp(&a.score));
        items
    }
}
