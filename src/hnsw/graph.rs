//! Graph arena and distance plumbing.

use std::collections::HashMap;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use super::config::HnswConfig;
use crate::quant::{Quantizer, QuantizerError};

/// Errors from graph operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Query or insert vector has the wrong length.
    #[error("graph dimension mismatch: expected {expected}, got {actual}")]
    DimMismatch {
        /// Graph dimension.
        expected: usize,
        /// Offending vector length.
        actual: usize,
    },

    /// Attached quantizer failed to encode or decode.
    #[error(transparent)]
    Quantizer(#[from] QuantizerError),
}

/// Vector payload of a node: raw floats, or the quantized code (never both).
#[derive(Clone, Debug, PartialEq)]
pub enum VectorData {
    /// Unquantized f32 vector.
    Raw(Vec<f32>),
    /// Quantizer-encoded bytes.
    Encoded(Vec<u8>),
}

/// One arena slot.
#[derive(Clone, Debug)]
pub(crate) struct Node {
    /// External embedding id.
    pub id: String,
    /// Raw or encoded vector.
    pub data: VectorData,
    /// Neighbor handles per layer; `layers.len() - 1` is the assigned layer.
    /// A node exists in every layer from 0 to its assigned layer inclusive.
    pub layers: Vec<Vec<u32>>,
    /// Monotone insertion sequence for stable equal-distance tie-breaks.
    pub seq: u64,
}

/// Query-side distance probe: the raw query plus its encoding when the
/// attached quantizer is trained. Computed once per search.
pub(crate) struct Probe {
    pub raw: Vec<f32>,
    pub encoded: Option<Vec<u8>>,
}

/// The HNSW graph.
///
/// Edges are inserted reciprocally but pruning can leave them asymmetric; all
/// traversal tolerates that. Deleting a node sweeps every incident edge so no
/// dangling handle survives in memory or in snapshots.
#[derive(Clone, Debug)]
pub struct HnswIndex {
    pub(crate) config: HnswConfig,
    pub(crate) dims: usize,
    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) by_id: HashMap<String, u32>,
    pub(crate) free: Vec<u32>,
    pub(crate) entry: Option<u32>,
    pub(crate) top_layer: usize,
    pub(crate) next_seq: u64,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) quantizer: Option<Arc<Quantizer>>,
    /// Level probability multiplier, `1 / ln(m)`.
    pub(crate) level_mult: f64,
}

impl HnswIndex {
    /// Creates an empty graph for `dims`-dimensional vectors.
    ///
    /// A quantizer may be attached; it is only consulted once trained.
    #[must_use]
    pub fn new(config: HnswConfig, dims: usize, quantizer: Option<Arc<Quantizer>>) -> Self {
        let level_mult = if config.m > 1 {
            1.0 / (config.m as f64).ln()
        } else {
            0.0
        };
        Self {
            config,
            dims,
            nodes: Vec::new(),
            by_id: HashMap::new(),
            free: Vec::new(),
            entry: None,
            top_layer: 0,
            next_seq: 0,
            rng: ChaCha8Rng::seed_from_u64(0x5eed),
            quantizer,
            level_mult,
        }
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the graph holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Whether `id` is indexed.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Configured dimension.
    #[must_use]
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Graph parameters.
    #[must_use]
    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// Attaches (or replaces) the quantizer reference. Existing nodes keep
    /// their current representation; new inserts encode once the quantizer is
    /// trained.
    pub fn set_quantizer(&mut self, quantizer: Option<Arc<Quantizer>>) {
        self.quantizer = quantizer;
    }

    /// External ids of all live nodes, in arena order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.nodes
            .iter()
            .flatten()
            .map(|n| n.id.clone())
            .collect()
    }

    pub(crate) fn node(&self, handle: u32) -> Option<&Node> {
        self.nodes.get(handle as usize).and_then(Option::as_ref)
    }

    pub(crate) fn node_mut(&mut self, handle: u32) -> Option<&mut Node> {
        self.nodes.get_mut(handle as usize).and_then(Option::as_mut)
    }

    /// Samples an assigned layer from the geometric distribution
    /// `floor(-ln(U) * mL)`, capped at [`HnswConfig::MAX_LAYER`].
    pub(crate) fn sample_layer(&mut self) -> usize {
        let u: f64 = self.rng.gen_range(f64::EPSILON..=1.0);
        let level = (-u.ln() * self.level_mult).floor();
        (level as usize).min(HnswConfig::MAX_LAYER)
    }

    /// Encodes the stored representation for a new node: quantized code when
    /// a trained quantizer is attached, raw otherwise. The raw vector is
    /// dropped after encoding to bound memory.
    pub(crate) fn store_vector(&self, vector: &[f32]) -> Result<VectorData, GraphError> {
        match &self.quantizer {
            Some(q) if q.is_trained() => Ok(VectorData::Encoded(q.encode(vector)?)),
            _ => Ok(VectorData::Raw(vector.to_vec())),
        }
    }

    /// Builds the query probe, encoding the query once when codes are in use.
    pub(crate) fn probe(&self, query: &[f32]) -> Result<Probe, GraphError> {
        if query.len() != self.dims {
            return Err(GraphError::DimMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }
        let encoded = match &self.quantizer {
            Some(q) if q.is_trained() => Some(q.encode(query)?),
            _ => None,
        };
        Ok(Probe {
            raw: query.to_vec(),
            encoded,
        })
    }

    /// Distance from the probe to a node. Smaller is closer.
    pub(crate) fn probe_distance(&self, probe: &Probe, handle: u32) -> f32 {
        let Some(node) = self.node(handle) else {
            return f32::MAX;
        };
        let sim = self.config.similarity;
        match (&node.data, &probe.encoded, &self.quantizer) {
            (VectorData::Raw(v), _, _) => sim.distance(&probe.raw, v),
            (VectorData::Encoded(code), Some(qcode), Some(q)) => {
                q.approx_distance(qcode, code, sim)
            }
            (VectorData::Encoded(code), _, Some(q)) => match q.decode(code) {
                Ok(v) => sim.distance(&probe.raw, &v),
                Err(_) => f32::MAX,
            },
            // Encoded data without a quantizer cannot be interpreted; order
            // such nodes last rather than corrupting results.
            (VectorData::Encoded(_), _, None) => f32::MAX,
        }
    }

    /// Distance between two stored nodes, used by the neighbor selection
    /// heuristic and pruning.
    pub(crate) fn node_distance(&self, a: u32, b: u32) -> f32 {
        let (Some(na), Some(nb)) = (self.node(a), self.node(b)) else {
            return f32::MAX;
        };
        let sim = self.config.similarity;
        match (&na.data, &nb.data) {
            (VectorData::Raw(va), VectorData::Raw(vb)) => sim.distance(va, vb),
            (VectorData::Encoded(ca), VectorData::Encoded(cb)) => match &self.quantizer {
                Some(q) => q.approx_distance(ca, cb, sim),
                None => f32::MAX,
            },
            (VectorData::Raw(v), VectorData::Encoded(c))
            | (VectorData::Encoded(c), VectorData::Raw(v)) => match &self.quantizer {
                Some(q) => match q.decode(c) {
                    Ok(decoded) => sim.distance(v, &decoded),
                    Err(_) => f32::MAX,
                },
                None => f32::MAX,
            },
        }
    }

    /// Approximate heap memory used by the graph, in bytes.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        let mut total = std::mem::size_of::<Self>();
        for node in self.nodes.iter().flatten() {
            total += node.id.len();
            total += match &node.data {
                VectorData::Raw(v) => v.len() * 4,
                VectorData::Encoded(c) => c.len(),
            };
            total += node.layers.iter().map(|l| l.len() * 4).sum::<usize>();
        }
        total
    }
}
