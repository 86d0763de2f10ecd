use std::collections::BinaryHeap;

use hashbrown::HashMap;
use petgraph::{graph::NodeIndex, visit::EdgeRef};

use super::state::State;
use crate::routing::{ModeGraph, Weight};

/// Costs and predecessors of the nodes settled by a search
#[derive(Debug, Clone)]
pub struct ShortestPathTree {
    pub start: NodeIndex,
    pub distances: HashMap<NodeIndex, f64>,
    predecessors: HashMap<NodeIndex, NodeIndex>,
}

impl ShortestPathTree {
    pub fn cost(&self, node: NodeIndex) -> Option<f64> {
        self.distances.get(&node).copied()
    }

    /// Node path from the start to `target`, `None` if not reached
    pub fn path_to(&self, target: NodeIndex) -> Option<Vec<NodeIndex>> {
        if !self.distances.contains_key(&target) {
            return None;
        }

        // Follow predecessors backward from target to start
        let mut path = vec![target];
        let mut current = target;
        while current != self.start {
            current = *self.predecessors.get(&current)?;
            path.push(current);
        }
        path.reverse();
        Some(path)
    }
}

/// Dijkstra's algorithm keeping predecessors
/// The search stops once `target` is settled or costs exceed `max_cost`
pub fn dijkstra_paths(
    graph: &ModeGraph,
    start: NodeIndex,
    target: Option<NodeIndex>,
    max_cost: Option<f64>,
    weight: Weight,
) -> ShortestPathTree {
    // Estimate capacity based on graph size
    let estimated_nodes = graph.node_count().min(1000);
    let mut distances: HashMap<NodeIndex, f64> = HashMap::with_capacity(estimated_nodes);
    let mut predecessors: HashMap<NodeIndex, NodeIndex> = HashMap::with_capacity(estimated_nodes);
    let mut heap = BinaryHeap::with_capacity(estimated_nodes / 4);

    heap.push(State {
        cost: 0.0,
        node: start,
    });
    distances.insert(start, 0.0);

    while let Some(State { cost, node }) = heap.pop() {
        if let Some(&best) = distances.get(&node)
            && cost > best
        {
            continue;
        }

        if target == Some(node) {
            break;
        }

        if max_cost.is_some_and(|max| cost > max) {
            break;
        }

        for edge in graph.graph.edges(node) {
            let next = edge.target();
            let next_cost = cost + weight.of(edge.weight());

            match distances.entry(next) {
                hashbrown::hash_map::Entry::Vacant(entry) => {
                    entry.insert(next_cost);
                    heap.push(State {
                        cost: next_cost,
                        node: next,
                    });
                    predecessors.insert(next, node);
                }
                hashbrown::hash_map::Entry::Occupied(mut entry) => {
                    if next_cost < *entry.get() {
                        *entry.get_mut() = next_cost;
                        heap.push(State {
                            cost: next_cost,
                            node: next,
                        });
                        predecessors.insert(next, node);
                    }
                }
            }
        }
    }

    ShortestPathTree {
        start,
        distances,
        predecessors,
    }
}
