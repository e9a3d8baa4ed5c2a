//! Pluggable text similarity.
//!
//! The planner blends a text-similarity term into the score when the request
//! carries query text and a module is configured; without a module the text
//! term is zero and search is purely vector-driven.

/// A text similarity function in `[0, 1]`.
///
/// Implementations must be pure and cheap; they run once per candidate.
pub trait TextSimilarity: Send + Sync {
    /// Similarity of `content` to `query`; higher means more similar.
    fn similarity(&self, query: &str, content: &str) -> f32;
}

/// Jaccard overlap of lowercased whitespace tokens.
///
/// A deliberately simple default: adequate for keyword-ish boosts without
/// pulling in a model. BM25-backed keyword ranking lives in the hybrid
/// search path, not here.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenOverlap;

impl TextSimilarity for TokenOverlap {
    fn similarity(&self, query: &str, content: &str) -> f32 {
        let q: std::collections::HashSet<String> =
            query.split_whitespace().map(str::to_lowercase).collect();
        let c: std::collections::HashSet<String> =
            content.split_whitespace().map(str::to_lowercase).collect();
        if q.is_empty() || c.is_empty() {
            return 0.0;
        }
        let shared = q.intersection(&c).count();
        let union = q.union(&c).count();
        shared as f32 / union as f32
    }
}
