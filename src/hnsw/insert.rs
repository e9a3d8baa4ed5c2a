//! Insertion, neighbor selection, and deletion.

use super::graph::{GraphError, HnswIndex, Node};
use super::search::Candidate;

impl HnswIndex {
    /// Inserts a vector under `id`.
    ///
    /// Inserting an id that already exists replaces the prior node: the old
    /// node is unlinked and the new vector is inserted fresh, equivalent to
    /// delete + insert under the caller's writer lock.
    ///
    /// # Errors
    ///
    /// [`GraphError::DimMismatch`] for a wrong-length vector;
    /// [`GraphError::Quantizer`] if the attached quantizer rejects encoding.
    pub fn insert(&mut self, id: &str, vector: &[f32]) -> Result<(), GraphError> {
        if vector.len() != self.dims {
            return Err(GraphError::DimMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }

        if self.contains(id) {
            self.remove(id);
        }

        let data = self.store_vector(vector)?;
        let probe = self.probe(vector)?;
        let layer = self.sample_layer();

        let seq = self.next_seq;
        self.next_seq += 1;
        let node = Node {
            id: id.to_string(),
            data,
            layers: vec![Vec::new(); layer + 1],
            seq,
        };
        let handle = self.alloc(node);
        self.by_id.insert(id.to_string(), handle);

        // First node becomes the entry point at its sampled layer.
        let Some(entry) = self.entry else {
            self.entry = Some(handle);
            self.top_layer = layer;
            return Ok(());
        };

        // Phase 1: greedy descent from the top layer down to layer + 1,
        // refining the nearest entry point with ef = 1.
        let mut ep = entry;
        if self.top_layer > layer {
            for l in (layer + 1..=self.top_layer).rev() {
                if let Some(best) = self.search_layer(&probe, &[ep], 1, l).first() {
                    ep = best.handle;
                }
            }
        }

        // Phase 2: connect on each layer from min(layer, top) down to 0.
        for l in (0..=layer.min(self.top_layer)).rev() {
            let candidates = self.search_layer(&probe, &[ep], self.config.ef_construction, l);
            let bound = self.config.max_connections(l);
            let selected = self.select_neighbors(&candidates, bound);

            if let Some(best) = candidates.first() {
                ep = best.handle;
            }

            if let Some(new_node) = self.node_mut(handle) {
                new_node.layers[l] = selected.clone();
            }

            for &nb in &selected {
                let over = {
                    let Some(nb_node) = self.node_mut(nb) else {
                        continue;
                    };
                    let Some(list) = nb_node.layers.get_mut(l) else {
                        continue;
                    };
                    if !list.contains(&handle) {
                        list.push(handle);
                    }
                    list.len() > bound
                };
                if over {
                    self.prune(nb, l, bound);
                }
            }
        }

        // Promote the entry point if the new node tops the graph.
        if layer > self.top_layer {
            self.top_layer = layer;
            self.entry = Some(handle);
        }

        Ok(())
    }

    /// Removes `id` and every edge incident to it.
    ///
    /// Returns `false` (a no-op, not an error) for an unknown id. If the
    /// removed node was the entry point, a surviving node at the highest
    /// remaining layer is promoted.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(handle) = self.by_id.remove(id) else {
            return false;
        };

        let assigned_layer = self
            .node(handle)
            .map(|n| n.layers.len().saturating_sub(1))
            .unwrap_or(0);
        self.nodes[handle as usize] = None;
        self.free.push(handle);

        // Sweep incoming edges. Pruning can leave edges asymmetric, so the
        // deleted node's own lists are not a complete inventory of its
        // incoming references.
        for node in self.nodes.iter_mut().flatten() {
            for list in &mut node.layers {
                list.retain(|&n| n != handle);
            }
        }

        if self.entry == Some(handle) || assigned_layer >= self.top_layer {
            self.recompute_entry();
        }
        true
    }

    fn alloc(&mut self, node: Node) -> u32 {
        if let Some(handle) = self.free.pop() {
            self.nodes[handle as usize] = Some(node);
            handle
        } else {
            self.nodes.push(Some(node));
            (self.nodes.len() - 1) as u32
        }
    }

    /// Promotes the live node with the highest assigned layer to entry point.
    fn recompute_entry(&mut self) {
        let mut best: Option<(u32, usize)> = None;
        for (i, slot) in self.nodes.iter().enumerate() {
            if let Some(node) = slot {
                let layer = node.layers.len() - 1;
                if best.map_or(true, |(_, bl)| layer > bl) {
                    best = Some((i as u32, layer));
                }
            }
        }
        match best {
            Some((handle, layer)) => {
                self.entry = Some(handle);
                self.top_layer = layer;
            }
            None => {
                self.entry = None;
                self.top_layer = 0;
            }
        }
    }

    /// Extended neighbor selection heuristic.
    ///
    /// Walking candidates in ascending distance, a candidate is accepted iff
    /// it is closer to the query than to any already-accepted neighbor. This
    /// keeps the selected set spread out and is the key to recall.
    pub(crate) fn select_neighbors(&self, candidates: &[Candidate], m: usize) -> Vec<u32> {
        let mut selected: Vec<u32> = Vec::with_capacity(m);
        for c in candidates {
            if selected.len() >= m {
                break;
            }
            let closer_to_existing = selected
                .iter()
                .any(|&r| self.node_distance(c.handle, r) < c.distance);
            if !closer_to_existing {
                selected.push(c.handle);
            }
        }
        selected
    }

    /// Re-selects a node's neighbor list at `layer` after it exceeded its
    /// bound, using the same heuristic with the node itself as the query.
    fn prune(&mut self, handle: u32, layer: usize, bound: usize) {
        let Some(list) = self.node(handle).and_then(|n| n.layers.get(layer)) else {
            return;
        };
        let mut candidates: Vec<Candidate> = list
            .iter()
            .filter_map(|&n| {
                self.node(n).map(|node| Candidate {
                    distance: self.node_distance(handle, n),
                    handle: n,
                    seq: node.seq,
                })
            })
            .collect();
        candidates.sort();

        let kept = self.select_neighbors(&candidates, bound);
        if let Some(node) = self.node_mut(handle) {
            if let Some(list) = node.layers.get_mut(layer) {
                *list = kept;
            }
        }
    }
}
