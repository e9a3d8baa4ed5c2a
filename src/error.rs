//! Unified error hierarchy.
//!
//! [`StoreError`] is the top-level error type returned by the engine API.
//! Subsystems define their own error enums ([`GraphError`], [`IvfError`],
//! [`QuantizerError`], [`FilterError`], [`SnapshotError`]) which convert into
//! `StoreError` at the engine boundary.
//!
//! # Failure semantics
//!
//! - Per-item failures in batch operations (upsert batches, rebuilds,
//!   training) are logged and counted; the batch proceeds.
//! - Snapshot failures during close are logged but never block close.
//! - A snapshot that fails to decode is not an error at the engine level:
//!   the caller falls back to rebuilding indexes from the backing store.

use thiserror::Error;

use crate::filter::FilterError;
use crate::hnsw::GraphError;
use crate::ivf::IvfError;
use crate::quant::QuantizerError;
use crate::snapshot::SnapshotError;

/// Top-level error type for all engine operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Any operation invoked after [`crate::VectorStore::close`].
    #[error("store is closed")]
    StoreClosed,

    /// The requested id is unknown.
    #[error("not found: {0}")]
    NotFound(String),

    /// Vector length incompatible with the configured dimension under the
    /// `Strict` adaptation policy.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimMismatch {
        /// Configured store dimension.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },

    /// NaN, infinite, or empty vector.
    #[error("invalid vector: {0}")]
    InvalidVector(String),

    /// Quantizer or IVF index used before training.
    #[error("not trained: {0}")]
    NotTrained(&'static str),

    /// Training corpus smaller than required.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData {
        /// Minimum corpus size for the operation.
        needed: usize,
        /// Actual corpus size supplied.
        got: usize,
    },

    /// Malformed filter string or unlowerable subexpression.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Wrapped error from the relational backing store.
    #[error("backing store: {0}")]
    Backing(#[from] rusqlite::Error),

    /// Snapshot decode failure (version or corruption). Callers generally
    /// recover by rebuilding from the backing store.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Operation cancelled through its [`crate::CancelToken`].
    #[error("operation cancelled")]
    Cancelled,

    /// HNSW index failure.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// IVF index failure.
    #[error(transparent)]
    Ivf(#[from] IvfError),

    /// Quantizer failure.
    #[error(transparent)]
    Quantizer(#[from] QuantizerError),

    /// JSON (de)serialization failure on metadata or ACL columns.
    #[error("metadata encoding: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, StoreError>;
