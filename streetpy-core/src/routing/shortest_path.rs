//! Shortest paths between nodes of a mode graph

use hashbrown::HashMap;
use itertools::Itertools;
use log::debug;
use rayon::prelude::*;
use serde::Serialize;

use super::dijkstra::dijkstra_paths;
use super::{ModeGraph, Weight};
use crate::{Error, NodeId};

/// Node path and its total cost
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodePath {
    pub nodes: Vec<NodeId>,
    pub cost: f64,
}

/// Shortest path between two nodes, `None` when the target is unreachable
///
/// # Errors
///
/// Returns an error if a node is not in the graph
pub fn shortest_path(
    graph: &ModeGraph,
    source: NodeId,
    target: NodeId,
    weight: Weight,
) -> Result<Option<NodePath>, Error> {
    let start = graph.node_index(source)?;
    let end = graph.node_index(target)?;

    let tree = dijkstra_paths(graph, start, Some(end), None, weight);
    let Some(path) = tree.path_to(end) else {
        return Ok(None);
    };
    let cost = tree.cost(end).unwrap_or_default();

    Ok(Some(NodePath {
        nodes: path.into_iter().map(|ix| graph.node_id(ix)).collect(),
        cost,
    }))
}

/// Shortest paths of many `(source, target)` pairs, in input order
///
/// Duplicated pairs are computed once. When `distance` is false, costs are
/// left to 0.
///
/// # Errors
///
/// Returns an error if a node is not in the graph
pub fn shortest_paths(
    graph: &ModeGraph,
    pairs: &[(NodeId, NodeId)],
    weight: Weight,
    distance: bool,
) -> Result<Vec<Option<NodePath>>, Error> {
    let unique: Vec<(NodeId, NodeId)> = pairs.iter().copied().unique().collect();
    debug!(
        "Computing {} shortest paths ({} unique pairs)",
        pairs.len(),
        unique.len()
    );

    let results: Vec<Option<NodePath>> = unique
        .par_iter()
        .map(|(source, target)| shortest_path(graph, *source, *target, weight))
        .collect::<Result<Vec<_>, _>>()?;

    let by_pair: HashMap<(NodeId, NodeId), Option<NodePath>> =
        unique.into_iter().zip(results).collect();

    Ok(pairs
        .iter()
        .map(|pair| {
            by_pair.get(pair).cloned().flatten().map(|mut path| {
                if !distance {
                    path.cost = 0.0;
                }
                path
            })
        })
        .collect())
}

/// Total cost of a node path, using the cheapest edge between consecutive
/// nodes
///
/// # Errors
///
/// Returns an error if a node is unknown or two consecutive nodes are not
/// adjacent
pub fn paths_distance(graph: &ModeGraph, path: &[NodeId], weight: Weight) -> Result<f64, Error> {
    path.iter()
        .tuple_windows()
        .map(|(a, b)| {
            let source = graph.node_index(*a)?;
            let target = graph.node_index(*b)?;
            graph
                .cheapest_edge(source, target, weight)
                .map(|edge| weight.of(edge))
                .ok_or_else(|| Error::InvalidData(format!("no edge between nodes {a} and {b}")))
        })
        .sum()
}
