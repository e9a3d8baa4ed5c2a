//! Core record types shared across the engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::{Result, StoreError};
use crate::filter::FilterExpr;

/// A stored embedding: vector plus payload.
///
/// Owned by the backing store; the in-memory indexes hold a copy or quantized
/// encoding of the vector only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// Opaque id, unique within the store.
    pub id: String,
    /// Dense float32 vector of the store's configured dimension.
    pub vector: Vec<f32>,
    /// Optional textual payload (feeds the keyword index).
    pub content: Option<String>,
    /// Optional owning document id (cascade-deleted with the document).
    pub doc_id: Option<String>,
    /// Unordered string-to-string metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Optional ACL tag set. `None` means public.
    pub acl: Option<Vec<String>>,
}

impl Embedding {
    /// Convenience constructor for an id + vector with no payload.
    #[must_use]
    pub fn new(id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
            content: None,
            doc_id: None,
            metadata: HashMap::new(),
            acl: None,
        }
    }

    /// Sets the textual content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Sets a metadata key.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the ACL tag set.
    #[must_use]
    pub fn with_acl(mut self, tags: Vec<String>) -> Self {
        self.acl = Some(tags);
        self
    }

    /// Sets the owning document id.
    #[must_use]
    pub fn with_doc_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }
}

/// A search hit: the embedding plus its computed score (higher = better).
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredEmbedding {
    /// The matched record.
    pub embedding: Embedding,
    /// Blended relevance score; higher is better.
    pub score: f32,
}

/// A raw index hit before row materialization.
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbor {
    /// External embedding id.
    pub id: String,
    /// Dissimilarity to the query; smaller is closer.
    pub distance: f32,
}

/// How a filter expression participates in a search.
#[derive(Clone, Debug, Default)]
pub enum FilterMode {
    /// No metadata filter.
    #[default]
    None,
    /// Pushed into predicate SQL before scoring; forces the linear path.
    Pre(FilterExpr),
    /// Evaluated in memory against each candidate after index retrieval.
    Post(FilterExpr),
}

impl FilterMode {
    /// Returns `true` when no filter is attached.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, FilterMode::None)
    }
}

/// A vector search request.
#[derive(Clone, Debug)]
pub struct SearchRequest {
    /// Query vector. Adapted to the store dimension per the configured policy.
    pub vector: Vec<f32>,
    /// Optional textual query; contributes `text_weight` of the score when a
    /// text-similarity module is configured.
    pub query_text: Option<String>,
    /// Number of results (default 10).
    pub k: usize,
    /// Minimum score; candidates below it are dropped.
    pub threshold: Option<f32>,
    /// Metadata filter and its placement.
    pub filter: FilterMode,
    /// Restrict to a named collection.
    pub collection: Option<String>,
    /// Caller ACL tags. Rows are visible if public or if any row tag is held.
    pub acl: Option<Vec<String>>,
    /// Weight of the text-similarity term, clamped to `[0, 1]`.
    pub text_weight: f32,
    /// Per-request `ef` override for the HNSW path.
    pub ef_search: Option<usize>,
    /// Cancellation token checked per candidate batch.
    pub cancel: CancelToken,
}

impl SearchRequest {
    /// Default result count when the request leaves `k` at zero.
    pub const DEFAULT_K: usize = 10;

    /// Creates a request for the `k` nearest neighbors of `vector`.
    #[must_use]
    pub fn new(vector: Vec<f32>, k: usize) -> Self {
        Self {
            vector,
            query_text: None,
            k,
            threshold: None,
            filter: FilterMode::None,
            collection: None,
            acl: None,
            text_weight: 0.0,
            ef_search: None,
            cancel: CancelToken::default(),
        }
    }

    /// Effective `k`: the requested count, or [`Self::DEFAULT_K`] when zero.
    #[must_use]
    pub fn effective_k(&self) -> usize {
        if self.k == 0 {
            Self::DEFAULT_K
        } else {
            self.k
        }
    }

    /// Attaches a pre-filter.
    #[must_use]
    pub fn with_pre_filter(mut self, expr: FilterExpr) -> Self {
        self.filter = FilterMode::Pre(expr);
        self
    }

    /// Attaches a post-filter.
    #[must_use]
    pub fn with_post_filter(mut self, expr: FilterExpr) -> Self {
        self.filter = FilterMode::Post(expr);
        self
    }

    /// Restricts the search to a collection.
    #[must_use]
    pub fn with_collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Sets the caller ACL tags.
    #[must_use]
    pub fn with_acl(mut self, tags: Vec<String>) -> Self {
        self.acl = Some(tags);
        self
    }

    /// Sets the textual query and its weight.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>, weight: f32) -> Self {
        self.query_text = Some(text.into());
        self.text_weight = weight;
        self
    }

    /// Sets the score threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// Validates that a vector is non-empty and finite.
///
/// # Errors
///
/// [`StoreError::InvalidVector`] for empty vectors or NaN/Inf components.
pub fn validate_vector(vector: &[f32]) -> Result<()> {
    if vector.is_empty() {
        return Err(StoreError::InvalidVector("empty vector".into()));
    }
    for (i, &v) in vector.iter().enumerate() {
        if v.is_nan() {
            return Err(StoreError::InvalidVector(format!("NaN at index {i}")));
        }
        if v.is_infinite() {
            return Err(StoreError::InvalidVector(format!("Inf at index {i}")));
        }
    }
    Ok(())
}

/// Encodes a vector to the on-disk blob form: `u32` LE length then f32 LE
/// values, no padding.
#[must_use]
pub fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(4 + vector.len() * 4);
    blob.extend_from_slice(&u32::try_from(vector.len()).unwrap_or(u32::MAX).to_le_bytes());
    for v in vector {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

/// Decodes a blob produced by [`vector_to_blob`].
///
/// Returns `None` for truncated or length-inconsistent blobs.
#[must_use]
pub fn blob_to_vector(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() < 4 {
        return None;
    }
    let len = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]) as usize;
    let body = &blob[4..];
    if body.len() != len * 4 {
        return None;
    }
    let mut vector = Vec::with_capacity(len);
    for chunk in body.chunks_exact(4) {
        vector.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Some(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_blob_round_trip() {
        let v = vec![1.0, -2.5, 0.0, 3.75];
        let blob = vector_to_blob(&v);
        assert_eq!(blob.len(), 4 + 16);
        assert_eq!(blob_to_vector(&blob), Some(v));
    }

    #[test]
    fn blob_rejects_truncation() {
        let blob = vector_to_blob(&[1.0, 2.0]);
        assert_eq!(blob_to_vector(&blob[..blob.len() - 1]), None);
        assert_eq!(blob_to_vector(&[1, 0]), None);
    }

    #[test]
    fn validate_rejects_nan_inf_empty() {
        assert!(validate_vector(&[]).is_err());
        assert!(validate_vector(&[1.0, f32::NAN]).is_err());
        assert!(validate_vector(&[f32::INFINITY]).is_err());
        assert!(validate_vector(&[0.5, -0.5]).is_ok());
    }

    #[test]
    fn effective_k_defaults_to_ten() {
        let req = SearchRequest::new(vec![0.0], 0);
        assert_eq!(req.effective_k(), 10);
        let req = SearchRequest::new(vec![0.0], 3);
        assert_eq!(req.effective_k(), 3);
    }
}
