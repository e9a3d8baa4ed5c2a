//! Hierarchical Navigable Small World graph index.
//!
//! An in-memory layered proximity graph supporting insert, delete, and
//! approximate top-k search. Nodes live in an arena keyed by `u32` handle;
//! neighbor lists are plain index vectors per layer. The arena plus a
//! readers-writer lock at the index boundary (held by the engine) gives many
//! concurrent readers and serialized writers without interior locking here.
//!
//! When a trained quantizer is attached, nodes store the encoded form only
//! and distances are computed on codes; the backing store retains the raw
//! vectors.

mod codec;
mod config;
mod graph;
mod insert;
mod search;

pub use config::HnswConfig;
pub use graph::{GraphError, HnswIndex, VectorData};
