//! Query planning: path selection, filtering, scoring, and the specialty
//! search modes.
//!
//! Path priority for a top-k search:
//!
//! 1. A `PreFilter` always takes the linear path — the predicate is pushed
//!    into SQL and the materialized set is scored exhaustively.
//! 2. Otherwise HNSW, when enabled and built.
//! 3. Otherwise IVF, when trained.
//! 4. Otherwise a linear scan.
//!
//! Index paths over-fetch (`2x` for HNSW, `4x` for IVF, `5x` for reranked
//! searches) to tolerate post-filter drop. Scores are always recomputed from
//! the materialized rows, so quantized index distances never leak into
//! reported scores.

use crate::adapt::AdaptPolicy;
use crate::cancel::CancelToken;
use crate::diversify::{diversify, DiversifyStrategy};
use crate::error::{Result, StoreError};
use crate::filter::{self, FilterError, FilterExpr};
use crate::rerank::{Reranker, RerankContext};
use crate::store::CandidateQuery;
use crate::stream::{ScoreFn, SearchStream, StreamOptions};
use crate::types::{Embedding, FilterMode, ScoredEmbedding, SearchRequest};

use super::{Inner, VectorStore};

pub(crate) const HNSW_OVERFETCH: usize = 2;
pub(crate) const IVF_OVERFETCH: usize = 4;
pub(crate) const RERANK_OVERFETCH: usize = 5;
const DIVERSIFY_OVERFETCH: usize = 3;

/// Negative-example search request: candidates are pulled toward positive
/// examples and pushed away from negative ones.
#[derive(Clone, Debug)]
pub struct NegativeRequest {
    /// Positive example vectors (at least one).
    pub positives: Vec<Vec<f32>>,
    /// Negative example vectors (may be empty).
    pub negatives: Vec<Vec<f32>>,
    /// Weight of the negative term.
    pub negative_weight: f32,
    /// Result count (0 = default 10).
    pub k: usize,
    /// Restrict to a collection.
    pub collection: Option<String>,
    /// Caller ACL tags.
    pub acl: Option<Vec<String>>,
    /// Cancellation token.
    pub cancel: CancelToken,
}

/// Anomaly search request: candidates are scored by their mean distance to
/// their nearest neighbors within the candidate set; the largest means are
/// the most anomalous.
#[derive(Clone, Debug)]
pub struct AnomalyRequest {
    /// Result count (0 = default 10).
    pub k: usize,
    /// Neighborhood size for the mean (0 = default 5).
    pub neighbors: usize,
    /// Restrict to a collection.
    pub collection: Option<String>,
    /// Caller ACL tags.
    pub acl: Option<Vec<String>>,
    /// Cancellation token.
    pub cancel: CancelToken,
}

impl VectorStore {
    /// Top-k search. See the module docs for path selection and the
    /// scoring formula `(1 - w_t) * vec_sim + w_t * text_sim`.
    ///
    /// # Errors
    ///
    /// [`StoreError::DimMismatch`] for an unadaptable query vector;
    /// [`StoreError::Filter`] for invalid filters;
    /// [`StoreError::Cancelled`] via the request token.
    pub fn search(&self, req: &SearchRequest) -> Result<Vec<ScoredEmbedding>> {
        self.search_pool(req, req.effective_k())
    }

    /// Search returning up to `pool_k` results (internal over-fetch entry
    /// point shared by hybrid, reranked, and diversified searches).
    pub(crate) fn search_pool(
        &self,
        req: &SearchRequest,
        pool_k: usize,
    ) -> Result<Vec<ScoredEmbedding>> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        req.cancel.check()?;

        let query = inner.adapt_query(&req.vector)?;
        let (rows, post) = gather_candidates(&inner, req, &query, pool_k)?;
        let mut scored = score_pool(&inner, req, &query, rows, post.as_ref())?;

        if let Some(threshold) = req.threshold {
            scored.retain(|s| s.score >= threshold);
        }
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(pool_k);
        Ok(scored)
    }

    /// Range search: every candidate within `radius` of the query, sorted
    /// best-first and not bounded by `k`.
    ///
    /// Uses the IVF path when trained (visiting more probes than a top-k
    /// search); linear otherwise. Distances are recomputed from the
    /// materialized rows, so quantized index distances cannot cause false
    /// admits.
    ///
    /// # Errors
    ///
    /// As [`VectorStore::search`].
    pub fn range_search(&self, req: &SearchRequest, radius: f32) -> Result<Vec<ScoredEmbedding>> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        req.cancel.check()?;

        let query = inner.adapt_query(&req.vector)?;
        let similarity = inner.config.similarity;

        let (rows, post) = if !matches!(req.filter, FilterMode::Pre(_)) && ivf_ready(&inner) {
            let ivf = inner.ivf.as_ref().expect("ivf_ready checked");
            let hits = ivf.read().search_range(&query, radius)?;
            let ids: Vec<String> = hits.into_iter().map(|n| n.id).collect();
            let rows = inner.store.fetch_candidates(&CandidateQuery {
                ids: Some(&ids),
                collection: req.collection.as_deref(),
                acl: req.acl.as_deref(),
                ..CandidateQuery::default()
            })?;
            (rows, post_filter_of(req))
        } else {
            linear_rows(&inner, req)?
        };

        let mut out = Vec::new();
        for (i, row) in rows.into_iter().enumerate() {
            if i % 100 == 0 {
                req.cancel.check()?;
            }
            if let Some(expr) = &post {
                if !filter::matches(expr, &row.metadata) {
                    continue;
                }
            }
            let Some(vector) = align_row_vector(&inner, &row) else {
                continue;
            };
            let distance = similarity.distance(&query, &vector);
            if distance <= radius {
                out.push(ScoredEmbedding {
                    score: similarity.similarity_from_distance(distance),
                    embedding: row,
                });
            }
        }
        out.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(out)
    }

    /// Negative-example search: `score = max_p sim(v, p) - w_n * max_n
    /// sim(v, n)`, sorted descending.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidVector`] without a positive example; otherwise
    /// as [`VectorStore::search`].
    pub fn negative_search(&self, req: &NegativeRequest) -> Result<Vec<ScoredEmbedding>> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        req.cancel.check()?;
        if req.positives.is_empty() {
            return Err(StoreError::InvalidVector(
                "negative search requires at least one positive example".into(),
            ));
        }

        let positives: Vec<Vec<f32>> = req
            .positives
            .iter()
            .map(|v| inner.adapt_query(v))
            .collect::<Result<_>>()?;
        let negatives: Vec<Vec<f32>> = req
            .negatives
            .iter()
            .map(|v| inner.adapt_query(v))
            .collect::<Result<_>>()?;

        let rows = inner.store.fetch_candidates(&CandidateQuery {
            collection: req.collection.as_deref(),
            acl: req.acl.as_deref(),
            ..CandidateQuery::default()
        })?;

        let similarity = inner.config.similarity;
        let mut out = Vec::new();
        for (i, row) in rows.into_iter().enumerate() {
            if i % 100 == 0 {
                req.cancel.check()?;
            }
            let Some(vector) = align_row_vector(&inner, &row) else {
                continue;
            };
            let best_pos = positives
                .iter()
                .map(|p| similarity.similarity(&vector, p))
                .fold(f32::MIN, f32::max);
            let worst_neg = negatives
                .iter()
                .map(|n| similarity.similarity(&vector, n))
                .fold(f32::MIN, f32::max);
            let penalty = if negatives.is_empty() {
                0.0
            } else {
                req.negative_weight * worst_neg
            };
            out.push(ScoredEmbedding {
                score: best_pos - penalty,
                embedding: row,
            });
        }
        out.sort_by(|a, b| b.score.total_cmp(&a.score));
        out.truncate(default_k(req.k));
        Ok(out)
    }

    /// Anomaly search: each candidate is scored by the mean distance to its
    /// `neighbors` nearest candidates; the largest mean is the most
    /// anomalous and sorts first.
    ///
    /// # Errors
    ///
    /// As [`VectorStore::search`].
    pub fn anomaly_search(&self, req: &AnomalyRequest) -> Result<Vec<ScoredEmbedding>> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        req.cancel.check()?;

        let rows = inner.store.fetch_candidates(&CandidateQuery {
            collection: req.collection.as_deref(),
            acl: req.acl.as_deref(),
            ..CandidateQuery::default()
        })?;

        let aligned: Vec<(Embedding, Vec<f32>)> = rows
            .into_iter()
            .filter_map(|row| {
                let v = align_row_vector(&inner, &row)?;
                Some((row, v))
            })
            .collect();

        let neighbors = if req.neighbors == 0 { 5 } else { req.neighbors };
        let similarity = inner.config.similarity;

        let mut out = Vec::with_capacity(aligned.len());
        for (i, (_, vector)) in aligned.iter().enumerate() {
            if i % 50 == 0 {
                req.cancel.check()?;
            }
            let mut distances: Vec<f32> = aligned
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, (_, other))| similarity.distance(vector, other))
                .collect();
            distances.sort_by(f32::total_cmp);
            distances.truncate(neighbors);
            let mean = if distances.is_empty() {
                0.0
            } else {
                distances.iter().sum::<f32>() / distances.len() as f32
            };
            out.push(mean);
        }

        let mut scored: Vec<ScoredEmbedding> = aligned
            .into_iter()
            .zip(out)
            .map(|((embedding, _), mean)| ScoredEmbedding {
                embedding,
                score: mean,
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(default_k(req.k));
        Ok(scored)
    }

    /// Search followed by diversification: over-fetches a 3x pool, then
    /// selects `k` under the strategy.
    ///
    /// # Errors
    ///
    /// As [`VectorStore::search`].
    pub fn search_diversified(
        &self,
        req: &SearchRequest,
        strategy: DiversifyStrategy,
    ) -> Result<Vec<ScoredEmbedding>> {
        let k = req.effective_k();
        let pool = self.search_pool(req, k * DIVERSIFY_OVERFETCH)?;
        let similarity = self.inner.read().config.similarity;
        Ok(diversify(pool, k, strategy, similarity))
    }

    /// Search followed by a reranker chain: over-fetches a 5x pool, applies
    /// each reranker in order, then truncates to `k`.
    ///
    /// # Errors
    ///
    /// As [`VectorStore::search`].
    pub fn search_reranked(
        &self,
        req: &SearchRequest,
        rerankers: &[&dyn Reranker],
    ) -> Result<Vec<ScoredEmbedding>> {
        let k = req.effective_k();
        let mut pool = self.search_pool(req, k * RERANK_OVERFETCH)?;

        let query = {
            let inner = self.inner.read();
            inner.ensure_open()?;
            inner.adapt_query(&req.vector)?
        };
        let similarity = self.inner.read().config.similarity;
        let ctx = RerankContext {
            query_text: req.query_text.as_deref(),
            query_vector: &query,
            similarity,
        };
        for reranker in rerankers {
            log::debug!("applying reranker {}", reranker.name());
            pool = reranker.rerank(&ctx, pool);
        }
        pool.truncate(k);
        Ok(pool)
    }

    /// Streaming search: materializes the candidate set, then returns a
    /// pull-model [`SearchStream`] that scores it batch by batch. No engine
    /// locks are held by the returned stream.
    ///
    /// # Errors
    ///
    /// As [`VectorStore::search`].
    pub fn stream_search(
        &self,
        req: &SearchRequest,
        options: StreamOptions,
    ) -> Result<SearchStream> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        req.cancel.check()?;

        let query = inner.adapt_query(&req.vector)?;
        let k = req.effective_k();
        let (rows, post) = gather_candidates(&inner, req, &query, k)?;

        // Align stored vectors up front so the scorer stays pure.
        let aligned: Vec<Embedding> = rows
            .into_iter()
            .filter_map(|mut row| {
                let v = align_row_vector(&inner, &row)?;
                row.vector = v;
                Some(row)
            })
            .collect();

        let similarity = inner.config.similarity;
        let text_sim = inner.text_sim.clone();
        let text = req.query_text.clone();
        let wt = req.text_weight.clamp(0.0, 1.0);
        let score: ScoreFn = Box::new(move |row: &Embedding| {
            if let Some(expr) = &post {
                if !filter::matches(expr, &row.metadata) {
                    return None;
                }
            }
            let vec_sim = similarity.similarity(&query, &row.vector);
            let text_score = match (&text, &text_sim) {
                (Some(t), Some(module)) => {
                    module.similarity(t, row.content.as_deref().unwrap_or(""))
                }
                _ => 0.0,
            };
            Some((1.0 - wt) * vec_sim + wt * text_score)
        });

        Ok(SearchStream::new(
            aligned,
            k,
            score,
            options,
            req.cancel.clone(),
        ))
    }
}

/// Ids matching a filter, for delete-by-filter. Tries the SQL lowering
/// first; an unlowerable filter scans and evaluates in memory.
pub(crate) fn filtered_ids(inner: &Inner, expr: &FilterExpr) -> Result<Vec<String>> {
    match inner.store.fetch_candidates(&CandidateQuery {
        pre_filter: Some(expr),
        ..CandidateQuery::default()
    }) {
        Ok(rows) => Ok(rows.into_iter().map(|r| r.id).collect()),
        Err(StoreError::Filter(FilterError::Unlowerable(reason))) => {
            log::debug!("delete-by-filter falling back to in-memory evaluation: {reason}");
            let rows = inner.store.fetch_candidates(&CandidateQuery::default())?;
            Ok(rows
                .into_iter()
                .filter(|r| filter::matches(expr, &r.metadata))
                .map(|r| r.id)
                .collect())
        }
        Err(e) => Err(e),
    }
}

fn default_k(k: usize) -> usize {
    if k == 0 {
        SearchRequest::DEFAULT_K
    } else {
        k
    }
}

fn hnsw_ready(inner: &Inner) -> bool {
    inner.hnsw.as_ref().is_some_and(|h| !h.read().is_empty())
}

fn ivf_ready(inner: &Inner) -> bool {
    inner.ivf.as_ref().is_some_and(|i| i.read().is_trained())
}

fn post_filter_of(req: &SearchRequest) -> Option<FilterExpr> {
    match &req.filter {
        FilterMode::Post(expr) => Some(expr.clone()),
        _ => None,
    }
}

/// Materializes the candidate rows for a request, returning them with the
/// effective post-filter (which may be a demoted pre-filter).
fn gather_candidates(
    inner: &Inner,
    req: &SearchRequest,
    query: &[f32],
    pool_k: usize,
) -> Result<(Vec<Embedding>, Option<FilterExpr>)> {
    if matches!(req.filter, FilterMode::Pre(_)) {
        return linear_rows(inner, req);
    }

    if hnsw_ready(inner) {
        let hnsw = inner.hnsw.as_ref().expect("hnsw_ready checked");
        let guard = hnsw.read();
        let ef = req.ef_search.unwrap_or(guard.config().ef_search);
        let hits = guard.search(query, pool_k * HNSW_OVERFETCH, ef)?;
        drop(guard);
        let ids: Vec<String> = hits.into_iter().map(|n| n.id).collect();
        let rows = inner.store.fetch_candidates(&CandidateQuery {
            ids: Some(&ids),
            collection: req.collection.as_deref(),
            acl: req.acl.as_deref(),
            ..CandidateQuery::default()
        })?;
        return Ok((rows, post_filter_of(req)));
    }

    if ivf_ready(inner) {
        let ivf = inner.ivf.as_ref().expect("ivf_ready checked");
        let hits = ivf.read().search(query, pool_k * IVF_OVERFETCH)?;
        let ids: Vec<String> = hits.into_iter().map(|n| n.id).collect();
        let rows = inner.store.fetch_candidates(&CandidateQuery {
            ids: Some(&ids),
            collection: req.collection.as_deref(),
            acl: req.acl.as_deref(),
            ..CandidateQuery::default()
        })?;
        return Ok((rows, post_filter_of(req)));
    }

    linear_rows(inner, req)
}

/// Linear-path candidate fetch: pushes the pre-filter into SQL where it
/// lowers, demoting it to a post-filter otherwise.
fn linear_rows(
    inner: &Inner,
    req: &SearchRequest,
) -> Result<(Vec<Embedding>, Option<FilterExpr>)> {
    match &req.filter {
        FilterMode::Pre(expr) => {
            expr.validate()?;
            match inner.store.fetch_candidates(&CandidateQuery {
                collection: req.collection.as_deref(),
                acl: req.acl.as_deref(),
                pre_filter: Some(expr),
                ..CandidateQuery::default()
            }) {
                Ok(rows) => Ok((rows, None)),
                Err(StoreError::Filter(FilterError::Unlowerable(reason))) => {
                    log::debug!("pre-filter demoted to post-filter: {reason}");
                    let rows = inner.store.fetch_candidates(&CandidateQuery {
                        collection: req.collection.as_deref(),
                        acl: req.acl.as_deref(),
                        ..CandidateQuery::default()
                    })?;
                    Ok((rows, Some(expr.clone())))
                }
                Err(e) => Err(e),
            }
        }
        other => {
            let rows = inner.store.fetch_candidates(&CandidateQuery {
                collection: req.collection.as_deref(),
                acl: req.acl.as_deref(),
                ..CandidateQuery::default()
            })?;
            let post = match other {
                FilterMode::Post(expr) => Some(expr.clone()),
                _ => None,
            };
            Ok((rows, post))
        }
    }
}

/// Scores a materialized candidate pool.
fn score_pool(
    inner: &Inner,
    req: &SearchRequest,
    query: &[f32],
    rows: Vec<Embedding>,
    post: Option<&FilterExpr>,
) -> Result<Vec<ScoredEmbedding>> {
    let wt = req.text_weight.clamp(0.0, 1.0);
    let mut out = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        if i % 100 == 0 {
            req.cancel.check()?;
        }
        if let Some(expr) = post {
            if !filter::matches(expr, &row.metadata) {
                continue;
            }
        }
        let Some(vector) = align_row_vector(inner, &row) else {
            continue;
        };
        let vec_sim = inner.config.similarity.similarity(query, &vector);
        let text_score = match (&req.query_text, &inner.text_sim) {
            (Some(t), Some(module)) => module.similarity(t, row.content.as_deref().unwrap_or("")),
            _ => 0.0,
        };
        out.push(ScoredEmbedding {
            score: (1.0 - wt) * vec_sim + wt * text_score,
            embedding: row,
        });
    }
    Ok(out)
}

/// Aligns a stored row's vector to the query dimension. Auto-adapting
/// policies adapt on the fly; `Strict`/`WarnOnly` rows that mismatch are
/// skipped (a per-item condition, not a query failure).
fn align_row_vector(inner: &Inner, row: &Embedding) -> Option<Vec<f32>> {
    if row.vector.len() == inner.dims {
        return Some(row.vector.clone());
    }
    match inner.config.adapt_policy {
        AdaptPolicy::AutoTruncate | AdaptPolicy::AutoPad | AdaptPolicy::SmartAdapt => {
            inner.adapt(&row.vector).ok()
        }
        AdaptPolicy::Strict | AdaptPolicy::WarnOnly => {
            log::debug!(
                "skipping unscorable row {}: dimension {} != {}",
                row.id,
                row.vector.len(),
                inner.dims
            );
            None
        }
    }
}
