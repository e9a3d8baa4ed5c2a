//! The vector store engine.
//!
//! [`VectorStore`] ties the pieces together: the SQLite backing store is the
//! system of record, the HNSW and IVF indexes accelerate reads, the
//! quantizer compresses what the indexes hold, and the snapshot layer makes
//! index state durable across restarts.
//!
//! # Locking discipline
//!
//! One readers-writer lock guards the engine handle: read for search, stats,
//! and single-row writes; write for init, close, training, batch deletes,
//! delete-by-filter, and snapshot save. Each index carries its own
//! readers-writer lock, independent of the engine lock, so an insert (engine
//! read + index write) does not serialize unrelated searches. The dimension
//! lock-on-first-insert uses a double-checked read-then-write upgrade.
//!
//! Reads observe prefix-consistent state: a read started after a write
//! completes sees its effects; a read concurrent with a write sees pre- or
//! post-write state but never a torn one.

mod hybrid;
mod persist;
mod planner;

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::adapt::{adapt_vector, AdaptPolicy};
use crate::cancel::CancelToken;
use crate::error::{Result, StoreError};
use crate::filter::FilterExpr;
use crate::hnsw::{HnswConfig, HnswIndex};
use crate::ivf::{IvfConfig, IvfError, IvfIndex};
use crate::metric::Similarity;
use crate::quant::{Quantizer, QuantizerKind};
use crate::store::{Document, SqliteStore};
use crate::textsim::TextSimilarity;
use crate::types::{validate_vector, Embedding};

/// Quantization settings for a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuantizationConfig {
    /// Quantizer family and width.
    pub kind: QuantizerKind,
    /// Train automatically once this many embeddings are stored. `None`
    /// leaves training to an explicit [`VectorStore::train_quantizer`] call.
    pub auto_train_threshold: Option<usize>,
}

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// SQLite file path; `None` runs in memory.
    pub path: Option<PathBuf>,
    /// Vector dimension. `0` locks to the first inserted vector's length.
    pub dimensions: usize,
    /// Similarity function for scoring and index navigation.
    pub similarity: Similarity,
    /// Policy for dimension-mismatched vectors.
    pub adapt_policy: AdaptPolicy,
    /// Collection ensured at bootstrap and used when none is named.
    pub default_collection: String,
    /// HNSW parameters; `None` disables the graph index.
    pub hnsw: Option<HnswConfig>,
    /// IVF parameters; `None` disables the partitioned index.
    pub ivf: Option<IvfConfig>,
    /// Quantization settings; `None` keeps raw vectors in the indexes.
    pub quantization: Option<QuantizationConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            dimensions: 0,
            similarity: Similarity::Cosine,
            adapt_policy: AdaptPolicy::Strict,
            default_collection: "default".to_string(),
            hnsw: Some(HnswConfig::new()),
            ivf: None,
            quantization: None,
        }
    }
}

/// Read-locked snapshot of store state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreStats {
    /// Embedding rows in the backing store.
    pub embeddings: usize,
    /// Locked dimension (0 when still unlocked).
    pub dimensions: usize,
    /// Live HNSW node count, when the graph index is enabled.
    pub hnsw_nodes: Option<usize>,
    /// IVF entry count, when the partitioned index is enabled.
    pub ivf_entries: Option<usize>,
    /// Whether the IVF index has been trained.
    pub ivf_trained: Option<bool>,
    /// Whether a trained quantizer is active.
    pub quantizer_trained: bool,
}

/// Outcome of a batch upsert: per-item failures are logged and counted, the
/// batch proceeds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Items stored (and indexed where possible).
    pub inserted: usize,
    /// Items rejected (invalid vector, strict dimension mismatch, ...).
    pub failed: usize,
}

pub(crate) struct Inner {
    pub closed: bool,
    pub dims: usize,
    pub config: StoreConfig,
    pub store: SqliteStore,
    pub hnsw: Option<RwLock<HnswIndex>>,
    pub ivf: Option<RwLock<IvfIndex>>,
    pub quantizer: Option<Arc<Quantizer>>,
    pub text_sim: Option<Arc<dyn TextSimilarity>>,
    pub adapt_rng: Mutex<ChaCha8Rng>,
}

impl Inner {
    pub fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(StoreError::StoreClosed)
        } else {
            Ok(())
        }
    }

    /// Adapts a vector to the locked dimension under the configured policy.
    pub fn adapt(&self, vector: &[f32]) -> Result<Vec<f32>> {
        adapt_vector(
            vector,
            self.dims,
            self.config.adapt_policy,
            &mut self.adapt_rng.lock(),
        )
    }

    /// Adapts a query vector; unlike stored rows, a query that still
    /// mismatches after adaptation cannot be scored at all.
    pub fn adapt_query(&self, vector: &[f32]) -> Result<Vec<f32>> {
        let adapted = self.adapt(vector)?;
        if adapted.len() != self.dims {
            return Err(StoreError::DimMismatch {
                expected: self.dims,
                actual: adapted.len(),
            });
        }
        Ok(adapted)
    }
}

/// The embedded vector store.
///
/// All methods take `&self`; interior locking follows the module-level
/// discipline. The handle is `Send + Sync` and intended to be shared behind
/// an `Arc` across threads.
pub struct VectorStore {
    pub(crate) inner: RwLock<Inner>,
}

impl VectorStore {
    /// Opens a store, restoring indexes from snapshots where possible and
    /// rebuilding them from the backing rows otherwise.
    ///
    /// Bootstrap always ensures the configured default collection exists —
    /// there is no implicit global state beyond this handle.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on SQLite failures. Snapshot decode failures
    /// are not errors; they degrade to a rebuild with a warning.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let store = match &config.path {
            Some(path) => SqliteStore::open(path)?,
            None => SqliteStore::open_in_memory()?,
        };

        let (_, existing_dims) =
            store.ensure_collection(&config.default_collection, config.dimensions)?;
        let mut dims = config.dimensions;
        if dims == 0 {
            // A prior run may have locked the dimension already.
            dims = existing_dims;
        } else if existing_dims == 0 {
            store.set_collection_dimensions(&config.default_collection, dims)?;
        }

        let mut inner = Inner {
            closed: false,
            dims,
            config,
            store,
            hnsw: None,
            ivf: None,
            quantizer: None,
            text_sim: None,
            adapt_rng: Mutex::new(ChaCha8Rng::seed_from_u64(0xada9)),
        };
        if inner.dims > 0 {
            persist::restore_or_rebuild(&mut inner)?;
        }
        Ok(Self {
            inner: RwLock::new(inner),
        })
    }

    /// Opens an in-memory store with the given dimension, HNSW enabled.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on SQLite failure.
    pub fn in_memory(dimensions: usize) -> Result<Self> {
        Self::open(StoreConfig {
            dimensions,
            ..StoreConfig::default()
        })
    }

    /// Configures the text-similarity module blended into scores when a
    /// request carries query text.
    pub fn set_text_similarity(&self, module: Arc<dyn TextSimilarity>) {
        self.inner.write().text_sim = Some(module);
    }

    /// Inserts or wholesale-replaces an embedding in the default collection.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidVector`] for NaN/Inf/empty vectors;
    /// [`StoreError::DimMismatch`] under the `Strict` policy;
    /// [`StoreError::StoreClosed`] after close.
    pub fn upsert(&self, embedding: Embedding) -> Result<()> {
        self.upsert_in(None, embedding)
    }

    /// Inserts or replaces an embedding in a named collection.
    ///
    /// # Errors
    ///
    /// As [`VectorStore::upsert`].
    pub fn upsert_in(&self, collection: Option<&str>, embedding: Embedding) -> Result<()> {
        validate_vector(&embedding.vector)?;
        self.ensure_dims(embedding.vector.len())?;

        let should_auto_train = {
            let inner = self.inner.read();
            inner.ensure_open()?;

            let vector = inner.adapt(&embedding.vector)?;
            let collection = collection.unwrap_or(&inner.config.default_collection);
            let record = Embedding { vector, ..embedding };
            inner.store.put_embedding(&record, collection)?;

            if record.vector.len() == inner.dims {
                if let Some(hnsw) = &inner.hnsw {
                    hnsw.write().insert(&record.id, &record.vector)?;
                }
                if let Some(ivf) = &inner.ivf {
                    let mut guard = ivf.write();
                    if guard.is_trained() {
                        guard.add(&record.id, &record.vector)?;
                    }
                }
            } else {
                log::warn!(
                    "embedding {} stored but not indexed: dimension {} != {}",
                    record.id,
                    record.vector.len(),
                    inner.dims
                );
            }

            self.auto_train_due(&inner)?
        };

        if should_auto_train {
            // Degrade to raw-vector mode when auto-training cannot complete.
            if let Err(e) = self.train_quantizer(&CancelToken::new()) {
                log::warn!("quantizer auto-train failed, staying on raw vectors: {e}");
            }
        }
        Ok(())
    }

    /// Best-effort batch upsert: invalid items are logged, counted, and
    /// skipped; the rest of the batch proceeds.
    ///
    /// # Errors
    ///
    /// [`StoreError::Cancelled`] when the token fires between items;
    /// [`StoreError::StoreClosed`] after close. Per-item failures are
    /// reported through [`BatchReport`], not as errors.
    pub fn upsert_batch(
        &self,
        embeddings: Vec<Embedding>,
        cancel: &CancelToken,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for (i, embedding) in embeddings.into_iter().enumerate() {
            if i % 100 == 0 {
                cancel.check()?;
            }
            let id = embedding.id.clone();
            match self.upsert(embedding) {
                Ok(()) => report.inserted += 1,
                Err(StoreError::StoreClosed) => return Err(StoreError::StoreClosed),
                Err(e) => {
                    log::warn!("batch upsert skipped {id}: {e}");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Fetches an embedding by id.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] for an unknown id.
    pub fn get(&self, id: &str) -> Result<Embedding> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        inner
            .store
            .get_embedding(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Whether an id exists.
    ///
    /// # Errors
    ///
    /// [`StoreError::StoreClosed`] after close.
    pub fn contains(&self, id: &str) -> Result<bool> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        Ok(inner.store.get_embedding(id)?.is_some())
    }

    /// Number of stored embeddings.
    ///
    /// # Errors
    ///
    /// [`StoreError::StoreClosed`] after close.
    pub fn count(&self) -> Result<usize> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        inner.store.count_embeddings()
    }

    /// All embedding ids in insertion order.
    ///
    /// # Errors
    ///
    /// [`StoreError::StoreClosed`] after close.
    pub fn list_ids(&self) -> Result<Vec<String>> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        inner.store.all_ids()
    }

    /// Deletes one embedding. Returns whether it existed (a missing id is a
    /// no-op, not an error).
    ///
    /// # Errors
    ///
    /// [`StoreError::StoreClosed`] after close; [`StoreError::Backing`] on
    /// SQLite failure.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        let existed = inner.store.delete_embedding(id)?;
        if let Some(hnsw) = &inner.hnsw {
            hnsw.write().remove(id);
        }
        if let Some(ivf) = &inner.ivf {
            ivf.write().remove(id);
        }
        Ok(existed)
    }

    /// Deletes a batch of ids, returning how many rows actually existed.
    ///
    /// A mix of existing and missing ids succeeds with the count of real
    /// deletions; a fully-missing batch returns `Ok(0)`, never `NotFound`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Cancelled`] before any deletion when the token has
    /// fired; [`StoreError::Backing`] on SQLite failure.
    pub fn delete_batch(&self, ids: &[String], cancel: &CancelToken) -> Result<usize> {
        let inner = self.inner.write();
        inner.ensure_open()?;
        cancel.check()?;

        let removed = inner.store.delete_embeddings(ids)?;
        for id in ids {
            if let Some(hnsw) = &inner.hnsw {
                hnsw.write().remove(id);
            }
            if let Some(ivf) = &inner.ivf {
                ivf.write().remove(id);
            }
        }
        Ok(removed)
    }

    /// Deletes every embedding matching the filter, returning the count.
    ///
    /// # Errors
    ///
    /// [`StoreError::Filter`] for invalid expressions;
    /// [`StoreError::Cancelled`] when the token fires before deletion.
    pub fn delete_by_filter(&self, expr: &FilterExpr, cancel: &CancelToken) -> Result<usize> {
        let inner = self.inner.write();
        inner.ensure_open()?;
        expr.validate()?;
        cancel.check()?;

        let matching = planner::filtered_ids(&inner, expr)?;
        cancel.check()?;
        let removed = inner.store.delete_embeddings(&matching)?;
        for id in &matching {
            if let Some(hnsw) = &inner.hnsw {
                hnsw.write().remove(id);
            }
            if let Some(ivf) = &inner.ivf {
                ivf.write().remove(id);
            }
        }
        Ok(removed)
    }

    /// Inserts or replaces a document row.
    ///
    /// # Errors
    ///
    /// [`StoreError::StoreClosed`] after close; [`StoreError::Backing`] on
    /// SQLite failure.
    pub fn put_document(&self, doc: &Document) -> Result<()> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        inner.store.put_document(doc)
    }

    /// Deletes a document; its embeddings cascade out of the backing store
    /// and are evicted from the indexes. Returns the cascaded embedding ids.
    ///
    /// # Errors
    ///
    /// [`StoreError::StoreClosed`] after close; [`StoreError::Backing`] on
    /// SQLite failure.
    pub fn delete_document(&self, id: &str) -> Result<Vec<String>> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        let cascaded = inner.store.delete_document(id)?;
        for embedding_id in &cascaded {
            if let Some(hnsw) = &inner.hnsw {
                hnsw.write().remove(embedding_id);
            }
            if let Some(ivf) = &inner.ivf {
                ivf.write().remove(embedding_id);
            }
        }
        Ok(cascaded)
    }

    /// Ensures a named collection exists with the given dimensions.
    ///
    /// # Errors
    ///
    /// [`StoreError::StoreClosed`] after close; [`StoreError::Backing`] on
    /// SQLite failure.
    pub fn ensure_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        inner.store.ensure_collection(name, dimensions)?;
        Ok(())
    }

    /// Trains the configured quantizer on all stored vectors and rebuilds
    /// the indexes over encoded vectors. Training happens at most once per
    /// store lifetime; a second call is a no-op.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotTrained`] when no quantizer is configured;
    /// [`StoreError::InsufficientData`] with an empty corpus;
    /// [`StoreError::Cancelled`] when the token fires between phases.
    pub fn train_quantizer(&self, cancel: &CancelToken) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        cancel.check()?;

        let Some(spec) = inner.config.quantization else {
            return Err(StoreError::NotTrained("no quantizer is configured"));
        };
        if inner.quantizer.is_some() {
            // The trained flag transitions exactly once per lifetime.
            return Ok(());
        }

        let rows = inner.store.all_embeddings()?;
        let corpus: Vec<Vec<f32>> = rows
            .iter()
            .filter(|r| r.vector.len() == inner.dims)
            .map(|r| r.vector.clone())
            .collect();
        if corpus.is_empty() {
            return Err(StoreError::InsufficientData { needed: 1, got: 0 });
        }

        let mut quantizer = Quantizer::new(spec.kind, inner.dims)?;
        quantizer.train(&corpus)?;
        cancel.check()?;

        inner.quantizer = Some(Arc::new(quantizer));
        persist::rebuild_indexes(&mut inner, &rows, cancel)?;
        log::info!(
            "quantizer trained over {} vectors; indexes rebuilt on encoded form",
            corpus.len()
        );
        Ok(())
    }

    /// (Re)trains the IVF index over all stored vectors and repopulates its
    /// inverted lists. Searches are blocked for the duration by the index
    /// write lock.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotTrained`] when no IVF index is configured;
    /// [`StoreError::InsufficientData`] when rows < `n_centroids`;
    /// [`StoreError::Cancelled`] when the token fires mid-training.
    pub fn train_ivf(&self, cancel: &CancelToken) -> Result<()> {
        let inner = self.inner.write();
        inner.ensure_open()?;
        cancel.check()?;

        let Some(ivf) = &inner.ivf else {
            return Err(StoreError::NotTrained("no IVF index is configured"));
        };

        let rows = inner.store.all_embeddings()?;
        let corpus: Vec<Vec<f32>> = rows
            .iter()
            .filter(|r| r.vector.len() == inner.dims)
            .map(|r| r.vector.clone())
            .collect();

        let mut guard = ivf.write();
        guard.train(&corpus, cancel).map_err(map_ivf_cancel)?;
        for row in &rows {
            if row.vector.len() != inner.dims {
                continue;
            }
            if let Err(e) = guard.add(&row.id, &row.vector) {
                log::warn!("ivf repopulation skipped {}: {e}", row.id);
            }
        }
        Ok(())
    }

    /// Current store statistics.
    ///
    /// # Errors
    ///
    /// [`StoreError::StoreClosed`] after close.
    pub fn stats(&self) -> Result<StoreStats> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        Ok(StoreStats {
            embeddings: inner.store.count_embeddings()?,
            dimensions: inner.dims,
            hnsw_nodes: inner.hnsw.as_ref().map(|h| h.read().len()),
            ivf_entries: inner.ivf.as_ref().map(|i| i.read().len()),
            ivf_trained: inner.ivf.as_ref().map(|i| i.read().is_trained()),
            quantizer_trained: inner
                .quantizer
                .as_ref()
                .is_some_and(|q| q.is_trained()),
        })
    }

    /// Persists index snapshots and closes the store. Further operations
    /// fail with [`StoreError::StoreClosed`]; `close` itself is idempotent.
    ///
    /// Snapshot writing runs under its own 5-second deadline, independent of
    /// any caller context, so shutdown makes progress under load. Taking the
    /// engine write lock first drains in-flight writers before the timer
    /// starts. A deadline overrun or write failure is logged and close still
    /// succeeds.
    ///
    /// # Errors
    ///
    /// None in practice; the signature leaves room for future fatal cases.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Ok(());
        }
        persist::save_snapshots(&inner);
        inner.closed = true;
        Ok(())
    }

    /// Locks the store dimension on first insert (double-checked: read,
    /// then upgrade to write only if still unlocked).
    fn ensure_dims(&self, incoming: usize) -> Result<()> {
        {
            let inner = self.inner.read();
            if inner.dims != 0 {
                return Ok(());
            }
        }
        let mut inner = self.inner.write();
        if inner.dims != 0 {
            return Ok(());
        }
        inner.ensure_open()?;
        inner.dims = incoming;
        let collection = inner.config.default_collection.clone();
        inner.store.set_collection_dimensions(&collection, incoming)?;
        persist::build_indexes(&mut inner);
        log::info!("store dimension locked to {incoming} on first insert");
        Ok(())
    }

    fn auto_train_due(&self, inner: &Inner) -> Result<bool> {
        if inner.quantizer.is_some() {
            return Ok(false);
        }
        let Some(threshold) = inner
            .config
            .quantization
            .as_ref()
            .and_then(|q| q.auto_train_threshold)
        else {
            return Ok(false);
        };
        Ok(inner.store.count_embeddings()? >= threshold)
    }
}

pub(crate) fn map_ivf_cancel(e: IvfError) -> StoreError {
    match e {
        IvfError::Cancelled => StoreError::Cancelled,
        IvfError::InsufficientData { needed, got } => StoreError::InsufficientData { needed, got },
        other => other.into(),
    }
}

pub use planner::{AnomalyRequest, NegativeRequest};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_close_lifecycle() {
        let store = VectorStore::in_memory(4).unwrap();
        store
            .upsert(Embedding::new("a", vec![1.0, 0.0, 0.0, 0.0]))
            .unwrap();
        assert_eq!(store.count().unwrap(), 1);

        store.close().unwrap();
        store.close().unwrap(); // idempotent
        assert!(matches!(store.count(), Err(StoreError::StoreClosed)));
        assert!(matches!(
            store.upsert(Embedding::new("b", vec![0.0; 4])),
            Err(StoreError::StoreClosed)
        ));
    }

    #[test]
    fn dimension_locks_on_first_insert() {
        let store = VectorStore::in_memory(0).unwrap();
        store.upsert(Embedding::new("a", vec![1.0, 2.0, 3.0])).unwrap();
        assert_eq!(store.stats().unwrap().dimensions, 3);
        // Second insert with a different length is rejected under Strict.
        assert!(matches!(
            store.upsert(Embedding::new("b", vec![1.0])),
            Err(StoreError::DimMismatch {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn invalid_vectors_are_rejected() {
        let store = VectorStore::in_memory(2).unwrap();
        assert!(matches!(
            store.upsert(Embedding::new("a", vec![])),
            Err(StoreError::InvalidVector(_))
        ));
        assert!(matches!(
            store.upsert(Embedding::new("a", vec![f32::NAN, 0.0])),
            Err(StoreError::InvalidVector(_))
        ));
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = VectorStore::in_memory(2).unwrap();
        assert!(matches!(store.get("nope"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_batch_mixed_ids_counts_real_rows() {
        let store = VectorStore::in_memory(2).unwrap();
        store.upsert(Embedding::new("a", vec![1.0, 0.0])).unwrap();
        store.upsert(Embedding::new("b", vec![0.0, 1.0])).unwrap();
        let removed = store
            .delete_batch(
                &["a".into(), "ghost".into(), "b".into()],
                &CancelToken::new(),
            )
            .unwrap();
        assert_eq!(removed, 2);
        // Fully-missing batches are Ok(0), never NotFound.
        let removed = store
            .delete_batch(&["x".into()], &CancelToken::new())
            .unwrap();
        assert_eq!(removed, 0);
    }

    #[test]
    fn batch_upsert_is_best_effort() {
        let store = VectorStore::in_memory(2).unwrap();
        let batch = vec![
            Embedding::new("ok1", vec![1.0, 0.0]),
            Embedding::new("bad", vec![f32::NAN, 0.0]),
            Embedding::new("wrongdim", vec![1.0]),
            Embedding::new("ok2", vec![0.0, 1.0]),
        ];
        let report = store.upsert_batch(batch, &CancelToken::new()).unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn cancelled_batch_upsert_stops() {
        let store = VectorStore::in_memory(2).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let batch = vec![Embedding::new("a", vec![1.0, 0.0])];
        assert!(matches!(
            store.upsert_batch(batch, &token),
            Err(StoreError::Cancelled)
        ));
    }

    #[test]
    fn stats_reflect_configuration() {
        let store = VectorStore::in_memory(2).unwrap();
        store.upsert(Embedding::new("a", vec![1.0, 0.0])).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.embeddings, 1);
        assert_eq!(stats.hnsw_nodes, Some(1));
        assert_eq!(stats.ivf_entries, None);
        assert!(!stats.quantizer_trained);
    }

    #[test]
    fn train_quantizer_without_config_errors() {
        let store = VectorStore::in_memory(2).unwrap();
        assert!(matches!(
            store.train_quantizer(&CancelToken::new()),
            Err(StoreError::NotTrained(_))
        ));
    }
}
