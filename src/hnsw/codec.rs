//! HNSW snapshot codec.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! [version:u8]
//! [m:u32] [ef_construction:u32] [ef_search:u32]
//! [similarity:u8] [quantizer_present:u8]
//! [dims:u32] [top_layer:u8]
//! [entry_id: len-prefixed bytes]        (empty = no entry point)
//! [node_count:u32]
//! per node, in compacted file order:
//!   [id: len-prefixed] [seq:u64] [layer_count:u8]
//!   per layer: [neighbor_count:u32] [neighbor_file_index:u32]*
//!   [vector_kind:u8]                    (0 = raw f32, 1 = encoded)
//!   [vector: len-prefixed bytes]        (raw = 4 * dims bytes)
//! ```
//!
//! Handles are compacted to file order at save time and edges to freed slots
//! are dropped, so a snapshot never contains dangling references.

use std::collections::HashMap;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::config::HnswConfig;
use super::graph::{HnswIndex, Node, VectorData};
use crate::metric::Similarity;
use crate::quant::Quantizer;
use crate::snapshot::{self, Reader, SnapshotError};

const WIRE_VERSION: u8 = 1;
const KIND_RAW: u8 = 0;
const KIND_ENCODED: u8 = 1;

impl HnswIndex {
    /// Serializes the graph to its snapshot payload.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(WIRE_VERSION);
        snapshot::put_u32(&mut buf, self.config.m as u32);
        snapshot::put_u32(&mut buf, self.config.ef_construction as u32);
        snapshot::put_u32(&mut buf, self.config.ef_search as u32);
        buf.push(self.config.similarity.code());
        buf.push(u8::from(self.quantizer.is_some()));
        snapshot::put_u32(&mut buf, self.dims as u32);
        buf.push(self.top_layer as u8);

        // Compact live handles into file order.
        let mut remap: HashMap<u32, u32> = HashMap::with_capacity(self.len());
        let mut live: Vec<(u32, &Node)> = Vec::with_capacity(self.len());
        for (i, slot) in self.nodes.iter().enumerate() {
            if let Some(node) = slot {
                remap.insert(i as u32, live.len() as u32);
                live.push((i as u32, node));
            }
        }

        match self.entry.and_then(|e| self.node(e)) {
            Some(node) => snapshot::put_str(&mut buf, &node.id),
            None => snapshot::put_str(&mut buf, ""),
        }

        snapshot::put_u32(&mut buf, live.len() as u32);
        for (_, node) in &live {
            snapshot::put_str(&mut buf, &node.id);
            snapshot::put_u64(&mut buf, node.seq);
            buf.push(node.layers.len() as u8);
            for list in &node.layers {
                // Freed-slot edges are filtered here rather than trusted.
                let mapped: Vec<u32> = list.iter().filter_map(|n| remap.get(n).copied()).collect();
                snapshot::put_u32(&mut buf, mapped.len() as u32);
                for n in mapped {
                    snapshot::put_u32(&mut buf, n);
                }
            }
            match &node.data {
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
        buf
    }

    /// Reconstructs a graph from its snapshot payload.
    ///
    /// The quantizer loaded alongside (if any) must be supplied so encoded
    /// vectors stay interpretable.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Version`] for an unknown version byte;
    /// [`SnapshotError::Corrupt`] for structural failures, including a blob
    /// that requires a quantizer when none is supplied.
    pub fn from_bytes(
        bytes: &[u8],
        quantizer: Option<Arc<Quantizer>>,
    ) -> Result<Self, SnapshotError> {
        let mut r = Reader::new(bytes);
        let version = r.u8()?;
        if version != WIRE_VERSION {
            return Err(SnapshotError::Version(version));
        }

        let m = r.u32()? as usize;
        let ef_construction = r.u32()? as usize;
        let ef_search = r.u32()? as usize;
        let similarity = Similarity::from_code(r.u8()?)
            .ok_or_else(|| SnapshotError::Corrupt("unknown similarity code".into()))?;
        let quantizer_present = r.u8()? != 0;
        if quantizer_present && quantizer.is_none() {
            return Err(SnapshotError::Corrupt(
                "snapshot was written with a quantizer but none was supplied".into(),
            ));
        }
        let dims = r.u32()? as usize;
        let top_layer = usize::from(r.u8()?);
        let entry_id = r.str()?;
        let node_count = r.u32()? as usize;

        let mut nodes: Vec<Option<Node>> = Vec::with_capacity(node_count);
        let mut by_id: HashMap<String, u32> = HashMap::with_capacity(node_count);
        let mut max_seq = 0u64;

        for file_index in 0..node_count {
            let id = r.str()?;
            let seq = r.u64()?;
            max_seq = max_seq.max(seq);
            let layer_count = usize::from(r.u8()?);
            if layer_count == 0 {
                return Err(SnapshotError::Corrupt(format!(
                    "node {id} has zero layers"
                )));
            }
            let mut layers = Vec::with_capacity(layer_count);
            for _ in 0..layer_count {
                let n = r.u32()? as usize;
                let mut list = Vec::with_capacity(n);
                for _ in 0..n {
                    let neighbor = r.u32()?;
                    if neighbor as usize >= node_count {
                        return Err(SnapshotError::Corrupt(format!(
                            "node {id} references out-of-range neighbor {neighbor}"
                        )));
                    }
                    list.push(neighbor);
                }
                layers.push(list);
            }

            let kind = r.u8()?;
            let raw = r.bytes()?;
            let data = match kind {
                KIND_RAW => {
                    if raw.len() != dims * 4 {
                        return Err(SnapshotError::Corrupt(format!(
                            "node {id} raw vector is {} bytes, expected {}",
                            raw.len(),
                            dims * 4
                        )));
                    }
                    let mut v = Vec::with_capacity(dims);
                    for chunk in raw.chunks_exact(4) {
                        v.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
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

            by_id.insert(id.clone(), file_index as u32);
            nodes.push(Some(Node {
                id,
                data,
                layers,
                seq,
            }));
        }

        let entry = if entry_id.is_empty() {
            None
        } else {
            Some(*by_id.get(&entry_id).ok_or_else(|| {
                SnapshotError::Corrupt(format!("entry point {entry_id} not among nodes"))
            })?)
        };

        let config = HnswConfig {
            m,
            ef_construction,
            ef_search,
            similarity,
        };
        let level_mult = if m > 1 { 1.0 / (m as f64).ln() } else { 0.0 };

        Ok(HnswIndex {
            config,
            dims,
            nodes,
            by_id,
            free: Vec::new(),
            entry,
            top_layer,
            next_seq: max_seq + 1,
            rng: ChaCha8Rng::seed_from_u64(0x5eed),
            quantizer,
            level_mult,
        })
    }
}
