use std::collections::BinaryHeap;

use hashbrown::HashMap;
use petgraph::{graph::NodeIndex, visit::EdgeRef};

use super::state::State;
use crate::routing::{ModeGraph, Weight};

/// Dijkstra's algorithm from one or several start nodes
/// Returns a map of reached node indices to their cost, nodes costing more
/// than `max_cost` are left out
pub fn dijkstra_path_weights(
    graph: &ModeGraph,
    starts: &[NodeIndex],
    max_cost: Option<f64>,
    weight: Weight,
) -> HashMap<NodeIndex, f64> {
    let mut distances: HashMap<NodeIndex, f64> = HashMap::new();
    let mut heap = BinaryHeap::new();

    // Start nodes have distance 0
    for &start in starts {
        heap.push(State {
            cost: 0.0,
            node: start,
        });
        distances.insert(start, 0.0);
    }

    while let Some(State { cost, node }) = heap.pop() {
        // Skip if we've found a better path
        if let Some(&best) = distances.get(&node)
            && cost > best
        {
            continue;
        }

        for edge in graph.graph.edges(node) {
            let next = edge.target();
            let next_cost = cost + weight.of(edge.weight());

            if max_cost.is_some_and(|max| next_cost > max) {
                continue;
            }

            // Add or update distance if better using Entry API
            match distances.entry(next) {
                hashbrown::hash_map::Entry::Vacant(entry) => {
                    entry.insert(next_cost);
                    heap.push(State {
                        cost: next_cost,
                        node: next,
                    });
                }
                hashbrown::hash_map::Entry::Occupied(mut entry) => {
                    if next_cost < *entry.get() {
                        *entry.get_mut() = next_cost;
                        heap.push(State {
                            cost: next_cost,
                            node: next,
                        });
                    }
                }
            }
        }
    }

    distances
}
