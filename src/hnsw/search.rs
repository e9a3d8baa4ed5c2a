//! Layer search and top-k queries.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

use super::graph::{GraphError, HnswIndex, Probe};
use crate::types::Neighbor;

/// A traversal candidate: distance plus tie-break sequence.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Candidate {
    pub distance: f32,
    pub handle: u32,
    pub seq: u64,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.handle == other.handle
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Equal distances order by insertion sequence so results are stable.
        self.distance
            .total_cmp(&other.distance)
            .then(self.seq.cmp(&other.seq))
    }
}

impl HnswIndex {
    /// Greedy beam search within one layer.
    ///
    /// Maintains a min-heap of candidates to expand and a max-heap of current
    /// best results capped at `ef`. Returns results sorted ascending by
    /// distance.
    pub(crate) fn search_layer(
        &self,
        probe: &Probe,
        entry_points: &[u32],
        ef: usize,
        layer: usize,
    ) -> Vec<Candidate> {
        let mut visited: HashSet<u32> = HashSet::new();
        let mut candidates: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();
        let mut results: BinaryHeap<Candidate> = BinaryHeap::new();

        for &ep in entry_points {
            let Some(node) = self.node(ep) else { continue };
            if node.layers.len() <= layer {
                continue;
            }
            if !visited.insert(ep) {
                continue;
            }
            let candidate = Candidate {
                distance: self.probe_distance(probe, ep),
                handle: ep,
                seq: node.seq,
            };
            candidates.push(Reverse(candidate));
            results.push(candidate);
        }

        while results.len() > ef {
            results.pop();
        }

        while let Some(Reverse(current)) = candidates.pop() {
            if let Some(worst) = results.peek() {
                if current.distance > worst.distance && results.len() >= ef {
                    break;
                }
            }

            let Some(node) = self.node(current.handle) else {
                continue;
            };
            let Some(neighbors) = node.layers.get(layer) else {
                continue;
            };

            for &n in neighbors {
                if !visited.insert(n) {
                    continue;
                }
                let Some(n_node) = self.node(n) else { continue };
                let dist = self.probe_distance(probe, n);

                let admit = match results.peek() {
                    Some(worst) if results.len() >= ef => dist < worst.distance,
                    _ => true,
                };
                if admit {
                    let candidate = Candidate {
                        distance: dist,
                        handle: n,
                        seq: n_node.seq,
                    };
                    candidates.push(Reverse(candidate));
                    results.push(candidate);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut sorted: Vec<Candidate> = results.into_vec();
        sorted.sort();
        sorted
    }

    /// Approximate top-k search.
    ///
    /// Descends from the entry point through the upper layers with `ef = 1`,
    /// then runs the base layer with `max(ef, k)`. An empty graph returns an
    /// empty list. Equal distances tie-break by insertion order.
    ///
    /// # Errors
    ///
    /// [`GraphError::DimMismatch`] if the query has the wrong length.
    pub fn search(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<Neighbor>, GraphError> {
        let probe = self.probe(query)?;
        let Some(entry) = self.entry else {
            return Ok(Vec::new());
        };

        let mut ep = entry;
        for layer in (1..=self.top_layer).rev() {
            if let Some(best) = self.search_layer(&probe, &[ep], 1, layer).first() {
                ep = best.handle;
            }
        }

        let ef0 = ef.max(k).max(1);
        let base = self.search_layer(&probe, &[ep], ef0, 0);

        Ok(base
            .into_iter()
            .take(k)
            .filter_map(|c| {
                self.node(c.handle).map(|n| Neighbor {
                    id: n.id.clone(),
                    distance: c.distance,
                })
            })
            .collect())
    }

    /// Searches with the configured default `ef_search`.
    ///
    /// # Errors
    ///
    /// [`GraphError::DimMismatch`] if the query has the wrong length.
    pub fn search_default(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, GraphError> {
        self.search(query, k, self.config.ef_search)
    }
}

#[cfg(test)]
mod tests {
    use super::super::config::HnswConfig;
    use super::*;
    use crate::metric::Similarity;

    fn euclid_index() -> HnswIndex {
        let config = HnswConfig {
            similarity: Similarity::Euclidean,
            ..HnswConfig::new()
        };
        HnswIndex::new(config, 2, None)
    }

    #[test]
    fn empty_graph_returns_empty() {
        let g = euclid_index();
        assert!(g.search(&[0.0, 0.0], 5, 10).unwrap().is_empty());
    }

    #[test]
    fn candidate_ordering_breaks_ties_by_seq() {
        let a = Candidate {
            distance: 1.0,
            handle: 1,
            seq: 5,
        };
        let b = Candidate {
            distance: 1.0,
            handle: 2,
            seq: 3,
        };
        assert!(b < a);
        let c = Candidate {
            distance: 0.5,
            handle: 3,
            seq: 9,
        };
        assert!(c < b);
    }

    #[test]
    fn single_node_is_found() {
        let mut g = euclid_index();
        g.insert("only", &[1.0, 2.0]).unwrap();
        let hits = g.search(&[1.0, 2.0], 3, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "only");
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[test]
    fn nearest_comes_first() {
        let mut g = euclid_index();
        g.insert("far", &[10.0, 10.0]).unwrap();
        g.insert("near", &[1.0, 1.0]).unwrap();
        g.insert("mid", &[5.0, 5.0]).unwrap();
        let hits = g.search(&[0.0, 0.0], 3, 10).unwrap();
        assert_eq!(hits[0].id, "near");
        assert_eq!(hits[1].id, "mid");
        assert_eq!(hits[2].id, "far");
    }
}
