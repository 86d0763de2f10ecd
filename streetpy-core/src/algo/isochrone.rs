//! Isochrones on a mode graph
//!
//! Reached nodes come from a multi-source Dijkstra with a cost cutoff.
//! Edges are reached fully or up to the remaining budget, and the area is
//! the dissolved set of H3 cells covering the reached geometry.

use geo::{Coord, LineString, MultiPolygon};
use h3o::{CellIndex, LatLng, Resolution, geom::SolventBuilder};
use hashbrown::HashSet;
use log::debug;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::routing::dijkstra::dijkstra_path_weights;
use crate::routing::{ModeGraph, Weight};
use crate::spatial::{sample_points, substring};
use crate::{Error, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsochroneOptions {
    pub weight: Weight,
    /// H3 resolution of the area cells
    pub resolution: u8,
    /// Distance in meters between sampled points of reached edges
    pub sample_step: f64,
}

impl Default for IsochroneOptions {
    fn default() -> Self {
        Self {
            weight: Weight::Time,
            resolution: 10,
            sample_step: 20.0,
        }
    }
}

/// Edge reached from the origins, `fraction` is 1 for fully reached edges
#[derive(Debug, Clone, PartialEq)]
pub struct ReachedEdge {
    pub street: usize,
    pub source: NodeId,
    pub target: NodeId,
    pub fraction: f64,
    pub geometry: LineString<f64>,
}

#[derive(Debug, Clone)]
pub struct Isochrone {
    /// Reached nodes and their cost
    pub nodes: Vec<(NodeId, f64)>,
    pub edges: Vec<ReachedEdge>,
    pub area: MultiPolygon<f64>,
}

/// Area reachable from the origins within `budget`
///
/// # Errors
///
/// Returns an error if an origin is unknown or cells cannot be built
pub fn calculate_isochrone(
    graph: &ModeGraph,
    origins: &[NodeId],
    budget: f64,
    options: &IsochroneOptions,
) -> Result<Isochrone, Error> {
    let resolution = Resolution::try_from(options.resolution)
        .map_err(|e| Error::InvalidData(format!("Got invalid H3 resolution {e}")))?;
    if budget < 0.0 || !budget.is_finite() {
        return Err(Error::IsochroneError(format!("invalid budget {budget}")));
    }
    let starts = origins
        .iter()
        .map(|id| graph.node_index(*id))
        .collect::<Result<Vec<_>, _>>()?;

    let costs = dijkstra_path_weights(graph, &starts, Some(budget), options.weight);

    let mut nodes: Vec<(NodeId, f64)> = costs
        .iter()
        .map(|(ix, cost)| (graph.node_id(*ix), *cost))
        .collect();
    nodes.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    let mut edges = Vec::new();
    for edge in graph.graph.edge_references() {
        let Some(start_cost) = costs.get(&edge.source()) else {
            continue;
        };
        let street = graph.street(edge.weight().street);
        let cost = options.weight.of(edge.weight());

        let fraction = if start_cost + cost <= budget || cost <= 0.0 {
            1.0
        } else {
            ((budget - start_cost) / cost).clamp(0.0, 1.0)
        };
        if fraction <= 0.0 {
            continue;
        }
        edges.push(ReachedEdge {
            street: edge.weight().street,
            source: street.source,
            target: street.target,
            fraction,
            geometry: street.geometry.clone(),
        });
    }

    // partly reached edges are cut at the remaining budget
    let partial: Vec<usize> = (0..edges.len()).filter(|i| edges[*i].fraction < 1.0).collect();
    let cut = substring(
        &partial.iter().map(|i| edges[*i].geometry.clone()).collect::<Vec<_>>(),
        &vec![None; partial.len()],
        &partial.iter().map(|i| Some(edges[*i].fraction)).collect::<Vec<_>>(),
        true,
    )?;
    for (i, geometry) in partial.into_iter().zip(cut) {
        edges[i].geometry = geometry;
    }

    let mut cells: HashSet<CellIndex> = HashSet::new();
    for ix in costs.keys() {
        cells.insert(to_cell(graph.graph[*ix].geometry.0, resolution)?);
    }
    for edge in &edges {
        for coord in sample_points(&edge.geometry, options.sample_step) {
            cells.insert(to_cell(coord, resolution)?);
        }
    }

    debug!(
        "Isochrone reached {} nodes, {} edges, {} cells",
        nodes.len(),
        edges.len(),
        cells.len()
    );

    let solvent = SolventBuilder::new().build();
    let area = solvent
        .dissolve(cells)
        .map_err(|e| Error::IsochroneError(e.to_string()))?;

    Ok(Isochrone { nodes, edges, area })
}

fn to_cell(coord: Coord<f64>, resolution: Resolution) -> Result<CellIndex, Error> {
    Ok(LatLng::new(coord.y, coord.x)?.to_cell(resolution))
}

/// Isochrones of several origins, each origin on its own
pub fn bulk_isochrones(
    graph: &ModeGraph,
    origins: &[NodeId],
    budget: f64,
    options: &IsochroneOptions,
) -> Result<Vec<Isochrone>, Error> {
    origins
        .par_iter()
        .map(|origin| calculate_isochrone(graph, &[*origin], budget, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{ModalEdge, ModalStreets};
    use crate::{Mode, spatial};
    use geo::line_string;

    // 1 -> 2 -> 3 -> 4, 10 s per edge, and 5 -> 1
    fn graph() -> ModeGraph {
        let edge = |source: NodeId, target: NodeId| {
            #[allow(clippy::cast_precision_loss)]
            let geometry = line_string![
                (x: source as f64 * 0.001, y: 0.0),
                (x: target as f64 * 0.001, y: 0.0)
            ];
            ModalEdge {
                source,
                target,
                refid: None,
                hierarchy: None,
                access: "yes".into(),
                length: spatial::line_length(&geometry),
                time: 10.0,
                geometry,
            }
        };
        ModeGraph::new(&ModalStreets {
            mode: Mode::Walk,
            edges: vec![edge(1, 2), edge(2, 3), edge(3, 4), edge(5, 1)],
        })
    }

    #[test]
    fn nodes_within_budget() {
        let g = graph();
        let iso = calculate_isochrone(&g, &[1], 25.0, &IsochroneOptions::default()).unwrap();
        let ids: Vec<NodeId> = iso.nodes.iter().map(|n| n.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let partial: Vec<&ReachedEdge> = iso.edges.iter().filter(|e| e.fraction < 1.0).collect();
        assert_eq!(partial.len(), 1);
        assert_eq!((partial[0].source, partial[0].target), (3, 4));
        assert!((partial[0].fraction - 0.5).abs() < 1e-9);
        assert!(!iso.area.0.is_empty());
    }

    #[test]
    fn boundary_edge_covers_remaining_budget() {
        let g = graph();
        let iso = calculate_isochrone(&g, &[5], 27.0, &IsochroneOptions::default()).unwrap();

        // 5 -> 1 -> 2 cost 20, 7 s left on 2 -> 3
        let edge = iso.edges.iter().find(|e| (e.source, e.target) == (2, 3)).unwrap();
        assert!((edge.fraction - 0.7).abs() < 1e-9);
        let full = g.street(edge.street).length;
        assert!((spatial::line_length(&edge.geometry) - 0.7 * full).abs() < 1e-3);
        assert_eq!(edge.geometry.0.first(), g.street(edge.street).geometry.0.first());

        // nothing is reached from 3
        assert!(iso.edges.iter().all(|e| e.source != 3));
    }

    #[test]
    fn multiple_origins_and_errors() {
        let g = graph();
        let iso = calculate_isochrone(&g, &[1, 3], 10.0, &IsochroneOptions::default()).unwrap();
        let ids: HashSet<NodeId> = iso.nodes.iter().map(|n| n.0).collect();
        assert_eq!(ids, [1, 2, 3, 4].into_iter().collect());

        assert!(matches!(
            calculate_isochrone(&g, &[42], 10.0, &IsochroneOptions::default()),
            Err(Error::UnknownNode(42))
        ));
        let options = IsochroneOptions {
            resolution: 20,
            ..IsochroneOptions::default()
        };
        assert!(calculate_isochrone(&g, &[1], 10.0, &options).is_err());
    }

    #[test]
    fn bulk_equals_single() {
        let g = graph();
        let options = IsochroneOptions::default();
        let bulk = bulk_isochrones(&g, &[1, 5], 15.0, &options).unwrap();
        for (origin, iso) in [1, 5].iter().zip(&bulk) {
            let single = calculate_isochrone(&g, &[*origin], 15.0, &options).unwrap();
            assert_eq!(iso.nodes, single.nodes);
        }
    }
}
