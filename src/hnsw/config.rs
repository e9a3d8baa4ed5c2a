//! HNSW parameters.

use serde::{Deserialize, Serialize};

use crate::metric::Similarity;

/// HNSW algorithm parameters.
///
/// Guidelines from the paper: `m` 12–48 for recall, lower for speed;
/// `ef_construction` trades build time for graph quality; `ef_search` trades
/// query time for recall. Layer 0 allows `2 * m` connections.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Max connections per node on layers >= 1.
    pub m: usize,
    /// Construction-time candidate list size.
    pub ef_construction: usize,
    /// Default search-time candidate list size.
    pub ef_search: usize,
    /// Distance function the graph navigates under.
    pub similarity: Similarity,
}

impl HnswConfig {
    /// Hard cap on sampled layers, preventing degenerate tall graphs.
    pub const MAX_LAYER: usize = 16;

    /// Creates a configuration with the usual defaults (`m = 16`,
    /// `ef_construction = 200`, `ef_search = 50`, cosine).
    #[must_use]
    pub fn new() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            similarity: Similarity::Cosine,
        }
    }

    /// Max connections on layer 0 (`2 * m`).
    #[must_use]
    pub fn m0(&self) -> usize {
        self.m * 2
    }

    /// Connection bound for a given layer.
    #[must_use]
    pub fn max_connections(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m0()
        } else {
            self.m
        }
    }
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_zero_doubles_connections() {
        let config = HnswConfig::new();
        assert_eq!(config.max_connections(0), 32);
        assert_eq!(config.max_connections(1), 16);
        assert_eq!(config.max_connections(5), 16);
    }
}
