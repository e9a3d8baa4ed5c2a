//! Hybrid vector + keyword search.
//!
//! Runs vector top-`2k` and BM25 keyword top-`2k` independently and fuses
//! them with Reciprocal Rank Fusion over the *union* of both result sets —
//! an item found by only one leg still contributes its single RRF term.
//! Access control applies to both legs: keyword hits are materialized
//! through the same collection/ACL clauses as vector hits.

use crate::error::Result;
use crate::fusion::{self, RRF_DEFAULT_K};
use crate::store::CandidateQuery;
use crate::types::{Embedding, ScoredEmbedding, SearchRequest};

use super::VectorStore;

impl VectorStore {
    /// Hybrid search with the standard RRF constant (`K = 60`).
    ///
    /// # Errors
    ///
    /// As [`VectorStore::search`].
    pub fn hybrid_search(&self, req: &SearchRequest) -> Result<Vec<ScoredEmbedding>> {
        self.hybrid_search_with_k(req, RRF_DEFAULT_K)
    }

    /// Hybrid search with an explicit RRF constant.
    ///
    /// Without query text the keyword leg is empty and this degenerates to
    /// RRF over the vector ranking alone (preserving its order).
    ///
    /// # Errors
    ///
    /// As [`VectorStore::search`].
    pub fn hybrid_search_with_k(
        &self,
        req: &SearchRequest,
        rrf_k: u32,
    ) -> Result<Vec<ScoredEmbedding>> {
        let k = req.effective_k();
        let fetch = k * 2;

        // Vector leg: the ordinary planner path, over-fetched to 2k.
        let vector_hits = self.search_pool(req, fetch)?;
        let vector_ranking: Vec<String> =
            vector_hits.iter().map(|s| s.embedding.id.clone()).collect();

        // Keyword leg: BM25 top-2k, ACL-checked at materialization.
        let (keyword_ranking, mut materialized) = match req.query_text.as_deref() {
            Some(text) if !text.trim().is_empty() => {
                let inner = self.inner.read();
                inner.ensure_open()?;
                req.cancel.check()?;
                let ranked = inner.store.keyword_search(text, fetch)?;
                let ids: Vec<String> = ranked.into_iter().map(|(id, _)| id).collect();
                let visible = inner.store.fetch_candidates(&CandidateQuery {
                    ids: Some(&ids),
                    collection: req.collection.as_deref(),
                    acl: req.acl.as_deref(),
                    ..CandidateQuery::default()
                })?;
                let visible_rows: std::collections::HashMap<String, Embedding> = visible
                    .into_iter()
                    .map(|e| (e.id.clone(), e))
                    .collect();
                // Keep BM25 order, dropping rows the caller cannot see.
                let ranking: Vec<String> = ids
                    .into_iter()
                    .filter(|id| visible_rows.contains_key(id))
                    .collect();
                (ranking, visible_rows)
            }
            _ => (Vec::new(), std::collections::HashMap::new()),
        };

        for hit in vector_hits {
            materialized
                .entry(hit.embedding.id.clone())
                .or_insert(hit.embedding);
        }

        let fused = fusion::fuse(&vector_ranking, &keyword_ranking, rrf_k, k);
        Ok(fused
            .into_iter()
            .filter_map(|hit| {
                materialized.remove(&hit.id).map(|embedding| ScoredEmbedding {
                    embedding,
                    score: hit.score,
                })
            })
            .collect())
    }

    /// Keyword-only search: BM25 top-k without a vector leg.
    ///
    /// Scores are negated BM25 ranks, so higher remains better. ACL and
    /// collection restrictions apply as in every other search.
    ///
    /// # Errors
    ///
    /// As [`VectorStore::search`].
    pub fn keyword_search(
        &self,
        text: &str,
        k: usize,
        collection: Option<&str>,
        acl: Option<&[String]>,
    ) -> Result<Vec<ScoredEmbedding>> {
        let inner = self.inner.read();
        inner.ensure_open()?;

        let k = if k == 0 { SearchRequest::DEFAULT_K } else { k };
        let ranked = inner.store.keyword_search(text, k * 2)?;
        let ids: Vec<String> = ranked.iter().map(|(id, _)| id.clone()).collect();
        let visible = inner.store.fetch_candidates(&CandidateQuery {
            ids: Some(&ids),
            collection,
            acl,
            ..CandidateQuery::default()
        })?;
        let mut rows: std::collections::HashMap<String, Embedding> =
            visible.into_iter().map(|e| (e.id.clone(), e)).collect();

        let mut out = Vec::with_capacity(k);
        for (id, bm25) in ranked {
            if out.len() >= k {
                break;
            }
            if let Some(embedding) = rows.remove(&id) {
                out.push(ScoredEmbedding {
                    embedding,
                    // FTS5 bm25() is smaller-is-better; negate so higher
                    // remains better like every other score in the crate.
                    score: -(bm25 as f32),
                });
            }
        }
        Ok(out)
    }
}
