//! # embervec
//!
//! An embedded vector store: high-dimensional embeddings with payload
//! (content, document linkage, metadata, ACL tags) behind approximate
//! nearest-neighbor, range, and hybrid vector+keyword search — durable
//! through a SQLite backing store, with no network surface of its own.
//!
//! ## Architecture
//!
//! - **Backing store** ([`store`]): SQLite rows are the system of record;
//!   FTS5 provides BM25 keyword ranking; index state snapshots persist in a
//!   blob table.
//! - **Indexes** ([`hnsw`], [`ivf`]): an in-memory HNSW graph (default) and
//!   an optional k-means IVF partitioning, both rebuildable from the store.
//! - **Quantization** ([`quant`]): optional scalar (4/6/8-bit) or binary
//!   compression of the vectors held inside the indexes.
//! - **Query planning** ([`VectorStore`]): pre-filter SQL pushdown or
//!   in-memory post-filters, collection and ACL scoping, score thresholds,
//!   hybrid RRF fusion, diversification, reranking, and streaming.
//!
//! ## Example
//!
//! ```
//! use embervec::{Embedding, SearchRequest, VectorStore};
//!
//! let store = VectorStore::in_memory(3).unwrap();
//! store.upsert(Embedding::new("a", vec![1.0, 0.0, 0.0])).unwrap();
//! store.upsert(Embedding::new("b", vec![0.0, 1.0, 0.0])).unwrap();
//!
//! let hits = store
//!     .search(&SearchRequest::new(vec![1.0, 0.0, 0.0], 1))
//!     .unwrap();
//! assert_eq!(hits[0].embedding.id, "a");
//! store.close().unwrap();
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]

/// Dimension adaptation policies.
pub mod adapt;

/// Cooperative cancellation tokens.
pub mod cancel;

/// Result diversification (MMR, DPP, distance floor, random).
pub mod diversify;

/// Unified error handling.
pub mod error;

/// Metadata filter expressions: parsing, evaluation, SQL lowering.
pub mod filter;

/// Reciprocal Rank Fusion.
pub mod fusion;

/// HNSW graph index.
pub mod hnsw;

/// IVF partitioned index.
pub mod ivf;

/// Distance metrics and similarity functions.
pub mod metric;

/// Vector quantization.
pub mod quant;

/// Reranker stack.
pub mod rerank;

/// Snapshot wire format helpers.
pub mod snapshot;

/// SQLite backing store.
pub mod store;

/// Streaming search.
pub mod stream;

/// Pluggable text similarity.
pub mod textsim;

/// Core record types.
pub mod types;

mod engine;

pub use adapt::AdaptPolicy;
pub use cancel::CancelToken;
pub use diversify::DiversifyStrategy;
pub use engine::{
    AnomalyRequest, BatchReport, NegativeRequest, QuantizationConfig, StoreConfig, StoreStats,
    VectorStore,
};
pub use error::{Result, StoreError};
pub use filter::FilterExpr;
pub use hnsw::HnswConfig;
pub use ivf::IvfConfig;
pub use metric::Similarity;
pub use quant::QuantizerKind;
pub use store::Document;
pub use stream::{SearchStream, StreamOptions};
pub use types::{Embedding, FilterMode, Neighbor, ScoredEmbedding, SearchRequest};

/// The crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
