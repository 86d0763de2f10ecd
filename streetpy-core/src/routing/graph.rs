//! Directed single mode graph with spatial indexes

use std::fmt;
use std::str::FromStr;

use geo::{BoundingRect, Coord, Point};
use hashbrown::HashMap;
use log::debug;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};

use super::single_mode::{ModalEdge, ModalStreets};
use crate::spatial::{self, LineLocation};
use crate::{Error, Meters, Mode, NodeId, Seconds};

/// Edge cost used by path searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weight {
    #[default]
    Time,
    Length,
}

impl Weight {
    pub fn of(self, edge: &GraphEdge) -> f64 {
        match self {
            Weight::Time => edge.time,
            Weight::Length => edge.length,
        }
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weight::Time => f.write_str("time"),
            Weight::Length => f.write_str("length"),
        }
    }
}

impl FromStr for Weight {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "time" => Ok(Weight::Time),
            "length" | "distance" => Ok(Weight::Length),
            other => Err(Error::InvalidData(format!("unknown weight {other}"))),
        }
    }
}

/// Street graph node
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: NodeId,
    pub geometry: Point<f64>,
}

/// Street graph edge, `street` indexes [`ModalStreets::edges`]
#[derive(Debug, Clone, Copy)]
pub struct GraphEdge {
    pub street: usize,
    pub time: Seconds,
    pub length: Meters,
}

pub type StreetGraph = DiGraph<GraphNode, GraphEdge>;

pub type IndexedPoint = GeomWithData<[f64; 2], NodeIndex>;

/// Edge envelope in the edge r-tree
#[derive(Debug, Clone)]
pub struct IndexedEdge {
    envelope: AABB<[f64; 2]>,
    pub street: usize,
}

impl RTreeObject for IndexedEdge {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Candidate edge of a point, see [`ModeGraph::edges_within`]
#[derive(Debug, Clone, Copy)]
pub struct EdgeCandidate {
    pub street: usize,
    pub location: LineLocation,
}

/// Routable graph of a single mode
///
/// Built once from a [`ModalStreets`] and shared read only across threads.
#[derive(Debug, Clone)]
pub struct ModeGraph {
    pub graph: StreetGraph,
    streets: ModalStreets,
    node_map: HashMap<NodeId, NodeIndex>,
    edge_map: Vec<Option<EdgeIndex>>,
    node_tree: RTree<IndexedPoint>,
    edge_tree: RTree<IndexedEdge>,
}

impl ModeGraph {
    pub fn new(streets: &ModalStreets) -> Self {
        let mut graph = StreetGraph::with_capacity(streets.len(), streets.len());
        let mut node_map: HashMap<NodeId, NodeIndex> = HashMap::with_capacity(streets.len());
        let mut edge_map = Vec::with_capacity(streets.len());

        let mut add_node = |graph: &mut StreetGraph, id: NodeId, coord: Coord<f64>| {
            *node_map.entry(id).or_insert_with(|| {
                graph.add_node(GraphNode {
                    id,
                    geometry: coord.into(),
                })
            })
        };

        for (street, edge) in streets.edges.iter().enumerate() {
            let (Some(first), Some(last)) = (edge.geometry.0.first(), edge.geometry.0.last())
            else {
                edge_map.push(None);
                continue;
            };
            let source = add_node(&mut graph, edge.source, *first);
            let target = add_node(&mut graph, edge.target, *last);
            edge_map.push(Some(graph.add_edge(
                source,
                target,
                GraphEdge {
                    street,
                    time: edge.time,
                    length: edge.length,
                },
            )));
        }

        let node_tree = RTree::bulk_load(
            graph
                .node_indices()
                .map(|ix| {
                    let p = graph[ix].geometry;
                    IndexedPoint::new([p.x(), p.y()], ix)
                })
                .collect(),
        );
        let edge_tree = RTree::bulk_load(
            streets
                .edges
                .iter()
                .enumerate()
                .filter_map(|(street, edge)| {
                    edge.geometry.bounding_rect().map(|rect| IndexedEdge {
                        envelope: AABB::from_corners(
                            [rect.min().x, rect.min().y],
                            [rect.max().x, rect.max().y],
                        ),
                        street,
                    })
                })
                .collect(),
        );

        debug!(
            "{} graph: {} nodes, {} edges",
            streets.mode,
            graph.node_count(),
            graph.edge_count()
        );

        Self {
            graph,
            streets: streets.clone(),
            node_map,
            edge_map,
            node_tree,
            edge_tree,
        }
    }

    pub fn mode(&self) -> Mode {
        self.streets.mode
    }

    pub fn streets(&self) -> &ModalStreets {
        &self.streets
    }

    pub fn street(&self, street: usize) -> &ModalEdge {
        &self.streets.edges[street]
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_index(&self, id: NodeId) -> Result<NodeIndex, Error> {
        self.node_map
            .get(&id)
            .copied()
            .ok_or(Error::UnknownNode(id))
    }

    pub fn node_id(&self, index: NodeIndex) -> NodeId {
        self.graph[index].id
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_map.contains_key(&id)
    }

    /// Graph edge of a street edge
    pub fn edge_index(&self, street: usize) -> Option<EdgeIndex> {
        self.edge_map.get(street).copied().flatten()
    }

    /// Cheapest edge between two adjacent nodes
    pub fn cheapest_edge(
        &self,
        source: NodeIndex,
        target: NodeIndex,
        weight: Weight,
    ) -> Option<&GraphEdge> {
        self.graph
            .edges(source)
            .filter(|e| e.target() == target)
            .map(|e| e.weight())
            .min_by(|a, b| weight.of(a).total_cmp(&weight.of(b)))
    }

    /// Closest node to a coordinate
    pub fn nearest_node(&self, coord: Coord<f64>) -> Result<NodeId, Error> {
        self.node_tree
            .nearest_neighbor(&[coord.x, coord.y])
            .map(|p| self.graph[p.data].id)
            .ok_or(Error::NoPointsFound)
    }

    /// Edges closer than `distance` meters to a coordinate, closest first
    pub fn edges_within(&self, coord: Coord<f64>, distance: Meters) -> Vec<EdgeCandidate> {
        let rect = spatial::envelope(coord, distance);
        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);

        let mut res: Vec<EdgeCandidate> = self
            .edge_tree
            .locate_in_envelope_intersecting(&envelope)
            .filter_map(|indexed| {
                spatial::line_locate(&self.streets.edges[indexed.street].geometry, coord)
                    .filter(|location| location.offset <= distance)
                    .map(|location| EdgeCandidate {
                        street: indexed.street,
                        location,
                    })
            })
            .collect();
        res.sort_by(|a, b| {
            a.location
                .offset
                .total_cmp(&b.location.offset)
                .then(a.street.cmp(&b.street))
        });
        res
    }
}
