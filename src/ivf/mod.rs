//! Inverted-file (IVF) index.
//!
//! Partitions the vector space into `n_centroids` cells by k-means over a
//! training sample. Each cell keeps an inverted list of `(id, vector)`
//! entries; a search visits the `n_probe` cells nearest the query and scans
//! their lists linearly. Accuracy rises with `n_probe` at linear cost; with
//! `n_probe = n_centroids` the search is exhaustive over the trained set.

mod kmeans;

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::hnsw::VectorData;
use crate::metric::Similarity;
use crate::quant::{Quantizer, QuantizerError};
use crate::snapshot::{self, Reader, SnapshotError};
use crate::types::Neighbor;

/// IVF failure modes.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IvfError {
    /// Add or search attempted before training.
    #[error("ivf index is not trained")]
    NotTrained,

    /// Training corpus smaller than the centroid count.
    #[error("ivf training needs at least {needed} vectors, got {got}")]
    InsufficientData {
        /// Required corpus size (`n_centroids`).
        needed: usize,
        /// Supplied corpus size.
        got: usize,
    },

    /// Vector has the wrong length.
    #[error("ivf dimension mismatch: expected {expected}, got {actual}")]
    DimMismatch {
        /// Index dimension.
        expected: usize,
        /// Offending vector length.
        actual: usize,
    },

    /// Training cancelled through its token.
    #[error("ivf training cancelled")]
    Cancelled,

    /// Attached quantizer failed.
    #[error(transparent)]
    Quantizer(#[from] QuantizerError),
}

/// IVF parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IvfConfig {
    /// Number of k-means cells.
    pub n_centroids: usize,
    /// Cells visited per search. Clamped to `n_centroids`.
    pub n_probe: usize,
    /// Lloyd iteration bound.
    pub max_iterations: usize,
    /// Training sample cap.
    pub training_sample: usize,
    /// Distance function.
    pub similarity: Similarity,
}

impl IvfConfig {
    /// Creates a configuration with the usual defaults
    /// (`n_centroids = 16`, `n_probe = 4`, 25 iterations, 10k sample).
    #[must_use]
    pub fn new(n_centroids: usize) -> Self {
        Self {
            n_centroids,
            n_probe: (n_centroids / 4).max(1),
            max_iterations: 25,
            training_sample: 10_000,
            similarity: Similarity::Cosine,
        }
    }
}

#[derive(Clone, Debug)]
struct IvfEntry {
    id: String,
    data: VectorData,
}

/// The IVF index.
#[derive(Clone, Debug)]
pub struct IvfIndex {
    config: IvfConfig,
    dims: usize,
    trained: bool,
    centroids: Vec<Vec<f32>>,
    lists: Vec<Vec<IvfEntry>>,
    quantizer: Option<Arc<Quantizer>>,
    rng: ChaCha8Rng,
}

const WIRE_VERSION: u8 = 1;
const KIND_RAW: u8 = 0;
const KIND_ENCODED: u8 = 1;

impl IvfIndex {
    /// Creates an untrained index for `dims`-dimensional vectors.
    #[must_use]
    pub fn new(config: IvfConfig, dims: usize, quantizer: Option<Arc<Quantizer>>) -> Self {
        Self {
            config,
            dims,
            trained: false,
            centroids: Vec::new(),
            lists: Vec::new(),
            quantizer,
            rng: ChaCha8Rng::seed_from_u64(0xc3_11),
        }
    }

    /// Whether training has completed.
    #[must_use]
    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Total entries across all inverted lists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    /// Whether no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(Vec::is_empty)
    }

    /// Index parameters.
    #[must_use]
    pub fn config(&self) -> &IvfConfig {
        &self.config
    }

    /// Configured dimension.
    #[must_use]
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Replaces the quantizer reference used for new entries.
    pub fn set_quantizer(&mut self, quantizer: Option<Arc<Quantizer>>) {
        self.quantizer = quantizer;
    }

    /// Trains centroids by k-means++ / Lloyd over (a sample of) `vectors`.
    ///
    /// Clears any prior inverted lists; the caller re-adds entries after a
    /// retrain. Concurrent searches must be excluded for the duration (the
    /// engine holds this index's write lock).
    ///
    /// # Errors
    ///
    /// [`IvfError::InsufficientData`] if `vectors.len() < n_centroids`;
    /// [`IvfError::DimMismatch`] on a wrong-length vector;
    /// [`IvfError::Cancelled`] when the token fires mid-iteration.
    pub fn train(&mut self, vectors: &[Vec<f32>], cancel: &CancelToken) -> Result<(), IvfError> {
        let k = self.config.n_centroids;
        if vectors.len() < k {
            return Err(IvfError::InsufficientData {
                needed: k,
                got: vectors.len(),
            });
        }
        for v in vectors {
            if v.len() != self.dims {
                return Err(IvfError::DimMismatch {
                    expected: self.dims,
                    actual: v.len(),
                });
            }
        }

        // Sample down large corpora; k-means quality saturates well below 10k.
        let sample: Vec<Vec<f32>> = if vectors.len() > self.config.training_sample {
            let step = vectors.len() / self.config.training_sample;
            vectors
                .iter()
                .step_by(step.max(1))
                .take(self.config.training_sample)
                .cloned()
                .collect()
        } else {
            vectors.to_vec()
        };

        let centroids = kmeans::kmeans(
            &sample,
            k,
            self.config.max_iterations,
            self.config.similarity,
            &mut self.rng,
            cancel,
        )?;

        self.centroids = centroids;
        self.lists = vec![Vec::new(); k];
        self.trained = true;
        Ok(())
    }

    /// Adds a vector to the list of its nearest centroid.
    ///
    /// An existing entry under the same id is replaced.
    ///
    /// # Errors
    ///
    /// [`IvfError::NotTrained`] before training;
    /// [`IvfError::DimMismatch`] on a wrong-length vector.
    pub fn add(&mut self, id: &str, vector: &[f32]) -> Result<(), IvfError> {
        if !self.trained {
            return Err(IvfError::NotTrained);
        }
        if vector.len() != self.dims {
            return Err(IvfError::DimMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }

        self.remove(id);

        let data = match &self.quantizer {
            Some(q) if q.is_trained() => VectorData::Encoded(q.encode(vector)?),
            _ => VectorData::Raw(vector.to_vec()),
        };
        let cell = kmeans::nearest_centroid(vector, &self.centroids, self.config.similarity);
        self.lists[cell].push(IvfEntry {
            id: id.to_string(),
            data,
        });
        Ok(())
    }

    /// Removes the first entry matching `id`. Returns whether one was found.
    /// The `trained` flag is preserved.
    pub fn remove(&mut self, id: &str) -> bool {
        for list in &mut self.lists {
            if let Some(pos) = list.iter().position(|e| e.id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Top-k search over the `n_probe` nearest cells.
    ///
    /// # Errors
    ///
    /// [`IvfError::NotTrained`] before training;
    /// [`IvfError::DimMismatch`] for a wrong-length query.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IvfError> {
        let probes = self.config.n_probe.min(self.config.n_centroids);
        self.search_probes(query, k, probes)
    }

    /// Range search: every entry within `radius`, unbounded by k.
    ///
    /// Visits more cells than a top-k search (4x the configured probes,
    /// capped at `n_centroids`) since the result set is not rank-limited.
    ///
    /// # Errors
    ///
    /// [`IvfError::NotTrained`] before training;
    /// [`IvfError::DimMismatch`] for a wrong-length query.
    pub fn search_range(&self, query: &[f32], radius: f32) -> Result<Vec<Neighbor>, IvfError> {
        let probes = (self.config.n_probe * 4).min(self.config.n_centroids);
        let mut hits = self.scan_probes(query, probes)?;
        hits.retain(|n| n.distance <= radius);
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(hits)
    }

    /// Top-k search with an explicit probe count.
    ///
    /// # Errors
    ///
    /// [`IvfError::NotTrained`] before training;
    /// [`IvfError::DimMismatch`] for a wrong-length query.
    pub fn search_probes(
        &self,
        query: &[f32],
        k: usize,
        probes: usize,
    ) -> Result<Vec<Neighbor>, IvfError> {
        let mut hits = self.scan_probes(query, probes)?;
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    fn scan_probes(&self, query: &[f32], probes: usize) -> Result<Vec<Neighbor>, IvfError> {
        if !self.trained {
            return Err(IvfError::NotTrained);
        }
        if query.len() != self.dims {
            return Err(IvfError::DimMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }

        // Rank cells by centroid distance, keep the closest `probes`.
        let mut cells: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, self.config.similarity.distance(query, c)))
            .collect();
        cells.sort_by(|a, b| a.1.total_cmp(&b.1));
        cells.truncate(probes.max(1));

        let encoded_query = match &self.quantizer {
            Some(q) if q.is_trained() => Some(q.encode(query)?),
            _ => None,
        };

        let mut hits = Vec::new();
        for (cell, _) in cells {
            for entry in &self.lists[cell] {
                let distance = self.entry_distance(query, encoded_query.as_deref(), entry);
                hits.push(Neighbor {
                    id: entry.id.clone(),
                    distance,
                });
            }
        }
        Ok(hits)
    }

    fn entry_distance(&self, query: &[f32], encoded_query: Option<&[u8]>, entry: &IvfEntry) -> f32 {
        let sim = self.config.similarity;
        match (&entry.data, encoded_query, &self.quantizer) {
            (VectorData::Raw(v), _, _) => sim.distance(query, v),
            (VectorData::Encoded(code), Some(qcode), Some(q)) => {
                q.approx_distance(qcode, code, sim)
            }
            (VectorData::Encoded(code), _, Some(q)) => match q.decode(code) {
                Ok(v) => sim.distance(query, &v),
                Err(_) => f32::MAX,
            },
            (VectorData::Encoded(_), _, None) => f32::MAX,
        }
    }

    /// Serializes the index to its snapshot payload.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(WIRE_VERSION);
        snapshot::put_u32(&mut buf, self.dims as u32);
        snapshot::put_u32(&mut buf, self.config.n_centroids as u32);
        snapshot::put_u32(&mut buf, self.config.n_probe as u32);
        buf.push(self.config.similarity.code());
        buf.push(u8::from(self.quantizer.is_some()));
        buf.push(u8::from(self.trained));

        for centroid in &self.centroids {
            for &x in centroid {
                snapshot::put_f32(&mut buf, x);
            }
        }
        for list in &self.lists {
            snapshot::put_u32(&mut buf, list.len() as u32);
            for entry in list {
                snapshot::put_str(&mut buf, &entry.id);
                match &entry.data {
                    VectorData::Raw(v) => {
                        buf.push(KIND_RAW);
                        let mut bytes = Vec::with_capacity(v.len() * 4);
                        for x in v {
                            bytes.extend_from_slice(&x.to_le_bytes());
                        }
                        snapshot::put_bytes(&mut buf, &bytes);
                    }
                    VectorData::Encoded(code) => {
                        buf.push(KIND_ENCODED);
                        snapshot::put_bytes(&mut buf, code);
                    }
                }
            }
        }
        buf
    }

    /// Reconstructs an index from its snapshot payload.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Version`] for an unknown version byte;
    /// [`SnapshotError::Corrupt`] for structural failures.
    pub fn from_bytes(
        bytes: &[u8],
        quantizer: Option<Arc<Quantizer>>,
    ) -> Result<Self, SnapshotError> {
        let mut r = Reader::new(bytes);
        let version = r.u8()?;
        if version != WIRE_VERSION {
            return Err(SnapshotError::Version(version));
        }

        let dims = r.u32()? as usize;
        let n_centroids = r.u32()? as usize;
        let n_probe = r.u32()? as usize;
        let similarity = Similarity::from_code(r.u8()?)
            .ok_or_else(|| SnapshotError::Corrupt("unknown similarity code".into()))?;
        let quantizer_present = r.u8()? != 0;
        if quantizer_present && quantizer.is_none() {
            return Err(SnapshotError::Corrupt(
                "snapshot was written with a quantizer but none was supplied".into(),
            ));
        }
        let trained = r.u8()? != 0;

        let mut centroids = Vec::new();
        let mut lists = Vec::new();
        if trained {
            centroids.reserve(n_centroids);
            for _ in 0..n_centroids {
                centroids.push(r.f32_array(dims)?);
            }
            lists.reserve(n_centroids);
            for _ in 0..n_centroids {
                let len = r.u32()? as usize;
                let mut list = Vec::with_capacity(len);
                for _ in 0..len {
                    let id = r.str()?;
                    let kind = r.u8()?;
                    let raw = r.bytes()?;
                    let data = match kind {
                        KIND_RAW => {
                            if raw.len() != dims * 4 {
                                return Err(SnapshotError::Corrupt(format!(
                                    "entry {id} raw vector is {} bytes, expected {}",
                                    raw.len(),
                                    dims * 4
                                )));
                            }
                            let mut v = Vec::with_capacity(dims);
                            for chunk in raw.chunks_exact(4) {
                                v.push(f32::from_le_bytes([
                                    chunk[0], chunk[1], chunk[2], chunk[3],
                                ]));
                            }
                            VectorData::Raw(v)
                        }
                        KIND_ENCODED => VectorData::Encoded(raw),
                        other => {
                            return Err(SnapshotError::Corrupt(format!(
                                "unknown vector kind {other}"
                            )))
                        }
                    };
                    list.push(IvfEntry { id, data });
                }
                lists.push(list);
            }
        }

        let config = IvfConfig {
            n_centroids,
            n_probe,
            max_iterations: 25,
            training_sample: 10_000,
            similarity,
        };

        Ok(Self {
            config,
            dims,
            trained,
            centroids,
            lists,
            quantizer,
            rng: ChaCha8Rng::seed_from_u64(0xc3_11),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Vec<f32>> {
        let mut out = Vec::new();
        for i in 0..40 {
            let jitter = (i % 10) as f32 * 0.05;
            out.push(vec![jitter, jitter]);
            out.push(vec![10.0 + jitter, 10.0 + jitter]);
        }
        out
    }

    fn trained_index() -> IvfIndex {
        let mut config = IvfConfig::new(4);
        config.similarity = Similarity::Euclidean;
        let mut index = IvfIndex::new(config, 2, None);
        index.train(&corpus(), &CancelToken::new()).unwrap();
        for (i, v) in corpus().iter().enumerate() {
            index.add(&format!("v{i}"), v).unwrap();
        }
        index
    }

    #[test]
    fn untrained_operations_fail() {
        let mut index = IvfIndex::new(IvfConfig::new(4), 2, None);
        assert_eq!(index.add("a", &[0.0, 0.0]), Err(IvfError::NotTrained));
        assert_eq!(index.search(&[0.0, 0.0], 3), Err(IvfError::NotTrained));
    }

    #[test]
    fn insufficient_data_is_rejected() {
        let mut index = IvfIndex::new(IvfConfig::new(16), 2, None);
        let small: Vec<Vec<f32>> = (0..5).map(|i| vec![i as f32, 0.0]).collect();
        assert_eq!(
            index.train(&small, &CancelToken::new()),
            Err(IvfError::InsufficientData { needed: 16, got: 5 })
        );
    }

    #[test]
    fn every_entry_lands_in_exactly_one_list() {
        let index = trained_index();
        assert_eq!(index.len(), 80);
        let mut seen = std::collections::HashSet::new();
        for list in &index.lists {
            for entry in list {
                assert!(seen.insert(entry.id.clone()), "duplicate across lists");
            }
        }
    }

    #[test]
    fn search_finds_near_cluster() {
        let index = trained_index();
        let hits = index.search(&[0.1, 0.1], 5).unwrap();
        assert_eq!(hits.len(), 5);
        // All hits come from the origin cluster.
        for h in &hits {
            assert!(h.distance < 5.0);
        }
    }

    #[test]
    fn full_probe_is_exhaustive() {
        let index = trained_index();
        let all = index
            .search_probes(&[0.0, 0.0], 80, index.config.n_centroids)
            .unwrap();
        assert_eq!(all.len(), 80);
    }

    #[test]
    fn range_search_is_unbounded_by_k() {
        let index = trained_index();
        let hits = index.search_range(&[0.0, 0.0], 1.0).unwrap();
        // Every origin-cluster point is within the radius.
        assert!(hits.len() >= 40, "got {}", hits.len());
        assert!(hits.iter().all(|h| h.distance <= 1.0));
    }

    #[test]
    fn remove_preserves_trained_flag() {
        let mut index = trained_index();
        assert!(index.remove("v3"));
        assert!(!index.remove("v3"));
        assert!(index.is_trained());
        assert_eq!(index.len(), 79);
    }

    #[test]
    fn retrain_clears_lists() {
        let mut index = trained_index();
        index.train(&corpus(), &CancelToken::new()).unwrap();
        assert!(index.is_empty());
        assert!(index.is_trained());
    }

    #[test]
    fn add_replaces_existing_id() {
        let mut index = trained_index();
        index.add("v0", &[10.0, 10.0]).unwrap();
        assert_eq!(index.len(), 80);
        let hits = index.search(&[10.0, 10.0], 3).unwrap();
        assert!(hits.iter().any(|h| h.id == "v0"));
    }

    #[test]
    fn snapshot_round_trip() {
        let index = trained_index();
        let restored = IvfIndex::from_bytes(&index.to_bytes(), None).unwrap();
        assert_eq!(restored.len(), index.len());
        assert!(restored.is_trained());

        let q = [10.0, 10.0];
        let before = index.search(&q, 7).unwrap();
        let after = restored.search(&q, 7).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn snapshot_rejects_unknown_version() {
        let index = trained_index();
        let mut bytes = index.to_bytes();
        bytes[0] = 0x7F;
        assert_eq!(
            IvfIndex::from_bytes(&bytes, None).unwrap_err(),
            SnapshotError::Version(0x7F)
        );
    }

    #[test]
    fn untrained_snapshot_round_trip() {
        let index = IvfIndex::new(IvfConfig::new(8), 3, None);
        let restored = IvfIndex::from_bytes(&index.to_bytes(), None).unwrap();
        assert!(!restored.is_trained());
        assert_eq!(restored.dims(), 3);
    }
}
