//! Topology of a street table - degrees, loops and connected components

use geo::Coord;
use hashbrown::{HashMap, HashSet};
use log::debug;
use petgraph::unionfind::UnionFind;

use super::table::StreetTable;
use crate::NodeId;

/// Number of edge ends on every node, loops count twice
pub fn degree(table: &StreetTable) -> HashMap<NodeId, usize> {
    let mut degrees = HashMap::with_capacity(table.len());
    for edge in &table.edges {
        *degrees.entry(edge.source).or_insert(0) += 1;
        *degrees.entry(edge.target).or_insert(0) += 1;
    }
    degrees
}

/// Per edge mask of self loops
pub fn is_loop(table: &StreetTable) -> Vec<bool> {
    table.edges.iter().map(|e| e.is_loop()).collect()
}

/// Dense index of every node of the table, in order of appearance
pub(crate) fn node_index(table: &StreetTable) -> HashMap<NodeId, usize> {
    let mut index = HashMap::with_capacity(table.len());
    for edge in &table.edges {
        for node in [edge.source, edge.target] {
            let next = index.len();
            index.entry(node).or_insert(next);
        }
    }
    index
}

/// Component label of every edge, labels are numbered from 0 in order of
/// first appearance
pub fn connected_components(table: &StreetTable) -> Vec<usize> {
    let index = node_index(table);
    let mut uf = UnionFind::<usize>::new(index.len());
    for edge in &table.edges {
        uf.union(index[&edge.source], index[&edge.target]);
    }

    let mut labels: HashMap<usize, usize> = HashMap::new();
    table
        .edges
        .iter()
        .map(|edge| {
            let root = uf.find(index[&edge.source]);
            let next = labels.len();
            *labels.entry(root).or_insert(next)
        })
        .collect()
}

/// Keep the largest component when `min_size` is `None`, otherwise every
/// component with at least `min_size` edges
pub fn filter_by_component(table: &StreetTable, min_size: Option<usize>) -> StreetTable {
    if table.is_empty() {
        return table.clone();
    }
    let labels = connected_components(table);
    let mut sizes: HashMap<usize, usize> = HashMap::new();
    for label in &labels {
        *sizes.entry(*label).or_insert(0) += 1;
    }

    let mask: Vec<bool> = match min_size {
        Some(min) => labels.iter().map(|l| sizes[l] >= min).collect(),
        None => {
            // ties go to the first component
            let largest = sizes
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
                .map_or(0, |(label, _)| *label);
            labels.iter().map(|l| *l == largest).collect()
        }
    };
    let res = table.filter(&mask);
    debug!(
        "Component filter kept {} of {} edges ({} components)",
        res.len(),
        table.len(),
        sizes.len()
    );
    res
}

/// True if any of the nodes is an edge end of the table
pub fn has_any_nodes(table: &StreetTable, nodes: &[NodeId]) -> bool {
    let nodes: HashSet<NodeId> = nodes.iter().copied().collect();
    table
        .edges
        .iter()
        .any(|e| nodes.contains(&e.source) || nodes.contains(&e.target))
}

/// Coordinates of every node, taken from the edge geometry ends
pub fn node_coordinates(table: &StreetTable) -> HashMap<NodeId, Coord<f64>> {
    let mut coords = HashMap::with_capacity(table.len());
    for edge in &table.edges {
        if let (Some(first), Some(last)) = (edge.geometry.0.first(), edge.geometry.0.last()) {
            coords.entry(edge.source).or_insert(*first);
            coords.entry(edge.target).or_insert(*last);
        }
    }
    coords
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mode, StreetEdge};
    use geo::line_string;

    fn edge(source: NodeId, target: NodeId) -> StreetEdge {
        #[allow(clippy::cast_precision_loss)]
        let (x0, x1) = (source as f64 * 0.001, target as f64 * 0.001);
        StreetEdge::new(source, target, line_string![(x: x0, y: 0.0), (x: x1, y: 0.0)])
    }

    fn table() -> StreetTable {
        StreetTable::new(
            vec![edge(1, 2), edge(2, 3), edge(3, 3), edge(10, 11), edge(3, 4)],
            vec![Mode::Walk],
            false,
        )
    }

    #[test]
    fn degrees_and_loops() {
        let t = table();
        let d = degree(&t);
        assert_eq!(d[&1], 1);
        assert_eq!(d[&3], 4);
        assert_eq!(is_loop(&t), vec![false, false, true, false, false]);
    }

    #[test]
    fn components() {
        let t = table();
        assert_eq!(connected_components(&t), vec![0, 0, 0, 1, 0]);

        let largest = filter_by_component(&t, None);
        assert_eq!(largest.len(), 4);
        assert!(!has_any_nodes(&largest, &[10, 11]));

        assert_eq!(filter_by_component(&t, Some(1)).len(), 5);
        assert_eq!(filter_by_component(&t, Some(2)).len(), 4);
        assert_eq!(filter_by_component(&t, Some(5)).len(), 0);
    }

    #[test]
    fn coordinates_from_geometry() {
        let coords = node_coordinates(&table());
        assert_eq!(coords[&2].x, 0.002);
        assert_eq!(coords.len(), 6);
    }
}
