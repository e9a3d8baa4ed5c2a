//! Keyword-match boosting reranker.

use super::{Reranker, RerankContext};
use crate::types::ScoredEmbedding;

/// Multiplies scores by `1 + boost * matches`, where `matches` counts the
/// whitespace-tokenized query terms that substring-match the candidate's
/// content (case-insensitively). Without query text this is the identity.
#[derive(Debug, Clone, Copy)]
pub struct KeywordBooster {
    boost: f32,
}

impl KeywordBooster {
    /// Creates a booster with the given per-match multiplier increment.
    #[must_use]
    pub fn new(boost: f32) -> Self {
        Self { boost }
    }
}

impl Reranker for KeywordBooster {
    fn name(&self) -> &'static str {
        "keyword-boost"
    }

    fn rerank(
        &self,
        ctx: &RerankContext<'_>,
        mut items: Vec<ScoredEmbedding>,
    ) -> Vec<ScoredEmbedding> {
        let Some(query) = ctx.query_text else {
            return items;
        };
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return items;
        }

        for item in &mut items {
            let content = item
                .embedding
                .content
                .as_deref()
                .unwrap_or("")
                .to_lowercase();
            let matches = terms.iter().filter(|t| content.contains(t.as_str())).count();
            item.score *= 1.0 + self.boost * matches as f32;
        }
        items.sort_by(|a, b| b.score.total_cmp(&a.score));
        items
    }
}
