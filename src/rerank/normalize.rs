//! Score normalization reranker.

use super::{Reranker, RerankContext};
use crate::types::ScoredEmbedding;

/// Linearly maps scores onto a target range.
///
/// The incoming minimum maps to `target_min`, the maximum to `target_max`;
/// order is unchanged. A constant-score list maps every item to `target_min`.
#[derive(Debug, Clone, Copy)]
pub struct ScoreNormalizer {
    target_min: f32,
    target_max: f32,
}

impl ScoreNormalizer {
    /// Creates a normalizer onto `[target_min, target_max]`.
    #[must_use]
    pub fn new(target_min: f32, target_max: f32) -> Self {
        Self {
            target_min,
            target_max,
        }
    }
}

impl Default for ScoreNormalizer {
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

impl Reranker for ScoreNormalizer {
    fn name(&self) -> &'static str {
        "score-normalize"
    }

    fn rerank(
        &self,
        _ctx: &RerankContext<'_>,
        mut items: Vec<ScoredEmbedding>,
    ) -> Vec<ScoredEmbedding> {
        let Some(min) = items.iter().map(|i| i.score).reduce(f32::min) else {
            return items;
        };
        let max = items
            .iter()
            .map(|i| i.score)
            .reduce(f32::max)
            .unwrap_or(min);
        let span = max - min;

        for item in &mut items {
            item.score = if span <= f32::EPSILON {
                self.target_min
            } else {
                self.target_min + (item.score - min) / span * (self.target_max - self.target_min)
            };
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::item;
    use super::*;
    use crate::metric::Similarity;

    fn ctx() -> RerankContext<'static> {
        RerankContext {
            query_text: None,
            query_vector: &[1.0],
            similarity: Similarity::Cosine,
        }
    }

    #[test]
    fn maps_extremes_onto_targets() {
        let items = vec![
            item("lo", vec![1.0], 2.0),
            item("mid", vec![1.0], 3.0),
            item("hi", vec![1.0], 4.0),
        ];
        let out = ScoreNormalizer::new(0.0, 1.0).rerank(&ctx(), items);
        assert_eq!(out[0].score, 0.0);
        assert_eq!(out[1].score, 0.5);
        assert_eq!(out[2].score, 1.0);
    }

    #[test]
    fn constant_scores_collapse_to_target_min() {
        let items = vec![item("a", vec![1.0], 5.0), item("b", vec![1.0], 5.0)];
        let out = ScoreNormalizer::new(0.25, 0.75).rerank(&ctx(), items);
        assert!(out.iter().all(|i| i.score == 0.25));
    }

    #[test]
    fn empty_input_is_fine() {
        assert!(ScoreNormalizer::default().rerank(&ctx(), vec![]).is_empty());
    }
}
