//! Reciprocal-rank-fusion reranker.

use super::{Reranker, RerankContext};
use crate::fusion::{self, RRF_DEFAULT_K};
use crate::textsim::{TextSimilarity, TokenOverlap};
use crate::types::ScoredEmbedding;

/// Fuses the intrinsic vector ranking (the incoming order) with a
/// text-overlap-derived ranking via weighted RRF.
///
/// Without query text the text ranking is empty and the reranker reduces to
/// RRF over the incoming order, which preserves it.
pub struct RrfReranker {
    k: u32,
    vector_weight: f32,
    text_weight: f32,
}

impl RrfReranker {
    /// Creates a reranker with the standard `K = 60` and equal weights.
    #[must_use]
    pub fn new() -> Self {
        Self {
            k: RRF_DEFAULT_K,
            vector_weight: 1.0,
            text_weight: 1.0,
        }
    }

    /// Overrides the RRF constant and ranking weights.
    #[must_use]
    pub fn with_params(k: u32, vector_weight: f32, text_weight: f32) -> Self {
        Self {
            k,
            vector_weight,
            text_weight,
        }
    }
}

impl Default for RrfReranker {
    fn default() -> Self {
        Self::new()
    }
}

impl Reranker for RrfReranker {
    fn name(&self) -> &'static str {
        "rrf"
    }

    fn rerank(
        &self,
        ctx: &RerankContext<'_>,
        mut items: Vec<ScoredEmbedding>,
    ) -> Vec<ScoredEmbedding> {
        if items.is_empty() {
            return items;
        }

        let vector_ranking: Vec<String> =
            items.iter().map(|i| i.embedding.id.clone()).collect();

        // Text-overlap ranking: candidates ordered by token overlap with the
        // query, ties keeping vector order (stable sort).
        let text_ranking: Vec<String> = match ctx.query_text {
            Some(query) if !query.trim().is_empty() => {
                let overlap = TokenOverlap;
                let mut scored: Vec<(String, f32)> = items
                    .iter()
                    .map(|i| {
                        let content = i.embedding.content.as_deref().unwrap_or("");
                        (i.embedding.id.clone(), overlap.similarity(query, content))
                    })
                    .collect();
                scored.sort_by(|a, b| b.1.total_cmp(&a.1));
                scored.into_iter().map(|(id, _)| id).collect()
            }
            _ => Vec::new(),
        };

        let fused = fusion::fuse_weighted(
            &[
                (&vector_ranking, self.vector_weight),
                (&text_ranking, self.text_weight),
            ],
            self.k,
        );

        for item in &mut items {
            item.score = fused.get(&item.embedding.id).copied().unwrap_or(0.0);
        }
        items.sort_by(|a, b| b.score.total_cmp(&a.score));
        items
    }
}
