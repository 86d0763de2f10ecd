//! Map matching of GPS trajectories on a mode graph
//!
//! Every point gets candidate positions on the closest edges. A Viterbi
//! pass over the points picks the sequence of candidates minimizing the
//! distance to the points plus the cost of travelling between them.

use geo::{Coord, LineString};
use hashbrown::HashMap;
use itertools::Itertools;
use log::{debug, info, warn};
use petgraph::graph::NodeIndex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::routing::dijkstra::{ShortestPathTree, dijkstra_paths};
use crate::routing::{ModeGraph, Weight};
use crate::spatial::{COORD_EQUAL_ATOL, haversine, line_length, sublinestring};
use crate::{Error, Meters, NodeId};

/// Transitions between two points cost at most this factor times their
/// straight line distance, priced at the highest cost per meter of the graph
const MAX_DETOUR: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub id: String,
    pub points: Vec<Coord<f64>>,
}

/// Part of an edge travelled to reach the stop `stop`
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedEdge {
    pub stop: usize,
    pub street: usize,
    pub source: NodeId,
    pub target: NodeId,
    pub geometry: LineString<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchedTrajectory {
    pub id: String,
    pub edges: Vec<MatchedEdge>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    street: usize,
    source: NodeIndex,
    target: NodeIndex,
    along: Meters,
    length: Meters,
    /// Edge cost
    cost: f64,
    /// Cost from the edge start to the projected point
    progress: f64,
    emission: f64,
}

impl Candidate {
    fn remaining(&self) -> f64 {
        self.cost - self.progress
    }
}

fn candidates(
    graph: &ModeGraph,
    point: Coord<f64>,
    distance: Meters,
    weight: Weight,
    k_nearest: Option<usize>,
) -> Vec<Candidate> {
    let found = graph.edges_within(point, distance);
    let k = k_nearest.unwrap_or(found.len());

    found
        .into_iter()
        .filter_map(|c| {
            let edge = graph.street(c.street);
            let (source, target) = graph.graph.edge_endpoints(graph.edge_index(c.street)?)?;
            let cost = edge.weight(weight);
            let length = line_length(&edge.geometry);
            let (emission, progress) = if length > 0.0 {
                (
                    c.location.offset * cost / length,
                    c.location.along * cost / length,
                )
            } else {
                (c.location.offset, 0.0)
            };
            Some(Candidate {
                street: c.street,
                source,
                target,
                along: c.location.along.min(length),
                length,
                cost,
                progress,
                emission,
            })
        })
        .take(k)
        .collect()
}

/// Highest cost per meter of the graph edges
fn cost_per_meter(graph: &ModeGraph, weight: Weight) -> f64 {
    graph
        .streets()
        .edges
        .iter()
        .filter(|e| e.length > 0.0)
        .map(|e| e.weight(weight) / e.length)
        .fold(0.0, f64::max)
}

/// Shortest path trees between the candidates of two consecutive points
struct Router<'a> {
    graph: &'a ModeGraph,
    weight: Weight,
    max_cost: f64,
    trees: HashMap<NodeIndex, ShortestPathTree>,
}

impl<'a> Router<'a> {
    fn new(graph: &'a ModeGraph, weight: Weight) -> Self {
        Self {
            graph,
            weight,
            max_cost: 0.0,
            trees: HashMap::new(),
        }
    }

    /// Next pair of points, searches stop at `max_cost`
    fn step(&mut self, max_cost: f64) {
        self.max_cost = max_cost;
        self.trees.clear();
    }

    fn tree(&mut self, start: NodeIndex) -> &ShortestPathTree {
        let (graph, weight, max_cost) = (self.graph, self.weight, self.max_cost);
        self.trees
            .entry(start)
            .or_insert_with(|| dijkstra_paths(graph, start, None, Some(max_cost), weight))
    }

    /// Cost of travelling from `a` to `b`, `None` when `b` cannot be reached
    /// within the step cost
    fn transition(&mut self, a: &Candidate, b: &Candidate) -> Option<f64> {
        if a.street == b.street && b.along + COORD_EQUAL_ATOL >= a.along {
            return Some((b.progress - a.progress).max(0.0));
        }
        let max_cost = self.max_cost;
        let between = self
            .tree(a.target)
            .cost(b.source)
            .filter(|cost| *cost <= max_cost)?;
        Some(a.remaining() + between + b.progress)
    }

    fn path(&self, from: NodeIndex, to: NodeIndex) -> Option<Vec<NodeIndex>> {
        dijkstra_paths(self.graph, from, Some(to), None, self.weight).path_to(to)
    }
}

fn push_piece(
    graph: &ModeGraph,
    edges: &mut Vec<MatchedEdge>,
    stop: usize,
    street: usize,
    start: Meters,
    end: Meters,
) -> Result<(), Error> {
    if end - start <= COORD_EQUAL_ATOL {
        return Ok(());
    }
    let edge = graph.street(street);
    edges.push(MatchedEdge {
        stop,
        street,
        source: edge.source,
        target: edge.target,
        geometry: sublinestring(&edge.geometry, start.max(0.0), end)?,
    });
    Ok(())
}

fn match_trajectory(
    graph: &ModeGraph,
    trajectory: &Trajectory,
    distance: Meters,
    weight: Weight,
    k_nearest: Option<usize>,
    rate: f64,
) -> Result<Option<MatchedTrajectory>, Error> {
    let layers: Vec<Vec<Candidate>> = trajectory
        .points
        .iter()
        .map(|p| candidates(graph, *p, distance, weight, k_nearest))
        .collect();
    if layers.is_empty() {
        return Ok(None);
    }
    if let Some(stop) = layers.iter().position(Vec::is_empty) {
        warn!(
            "Trajectory {}: no edge within {distance} m of point {stop}, skipped",
            trajectory.id
        );
        return Ok(None);
    }

    let mut router = Router::new(graph, weight);
    let mut costs: Vec<Vec<f64>> = vec![layers[0].iter().map(|c| c.emission).collect()];
    let mut back: Vec<Vec<usize>> = vec![vec![0; layers[0].len()]];

    for (stop, layer) in layers.iter().enumerate().skip(1) {
        let previous = &layers[stop - 1];
        let gap = haversine(trajectory.points[stop - 1], trajectory.points[stop]);
        router.step(MAX_DETOUR * (gap + 2.0 * distance) * rate);
        let mut layer_costs = Vec::with_capacity(layer.len());
        let mut layer_back = Vec::with_capacity(layer.len());
        for b in layer {
            let best = previous
                .iter()
                .enumerate()
                .filter(|(k, _)| costs[stop - 1][*k].is_finite())
                .filter_map(|(k, a)| {
                    router
                        .transition(a, b)
                        .map(|t| (k, costs[stop - 1][k] + t))
                })
                .min_by(|x, y| x.1.total_cmp(&y.1));
            match best {
                Some((k, cost)) => {
                    layer_costs.push(cost + b.emission);
                    layer_back.push(k);
                }
                None => {
                    layer_costs.push(f64::INFINITY);
                    layer_back.push(0);
                }
            }
        }
        if layer_costs.iter().all(|c| !c.is_finite()) {
            warn!(
                "Trajectory {}: point {stop} cannot be reached from the previous one, skipped",
                trajectory.id
            );
            return Ok(None);
        }
        costs.push(layer_costs);
        back.push(layer_back);
    }

    let last = costs.len() - 1;
    let Some((mut current, _)) = costs[last]
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
    else {
        return Ok(None);
    };
    let mut chosen = vec![current; layers.len()];
    for stop in (1..layers.len()).rev() {
        chosen[stop] = current;
        current = back[stop][current];
    }
    chosen[0] = current;

    let mut edges = Vec::new();
    for (stop, (i, j)) in chosen.iter().tuple_windows().enumerate() {
        let stop = stop + 1;
        let a = layers[stop - 1][*i];
        let b = layers[stop][*j];

        if a.street == b.street && b.along + COORD_EQUAL_ATOL >= a.along {
            push_piece(graph, &mut edges, stop, a.street, a.along, b.along)?;
            continue;
        }

        push_piece(graph, &mut edges, stop, a.street, a.along, a.length)?;
        let nodes = router.path(a.target, b.source).unwrap_or_default();
        for (u, v) in nodes.iter().tuple_windows() {
            if let Some(edge) = graph.cheapest_edge(*u, *v, weight) {
                let street = edge.street;
                let length = line_length(&graph.street(street).geometry);
                push_piece(graph, &mut edges, stop, street, 0.0, length)?;
            }
        }
        push_piece(graph, &mut edges, stop, b.street, 0.0, b.along)?;
    }

    debug!(
        "Trajectory {}: {} points matched on {} edges",
        trajectory.id,
        trajectory.points.len(),
        edges.len()
    );
    Ok(Some(MatchedTrajectory {
        id: trajectory.id.clone(),
        edges,
    }))
}

/// Match trajectories on the graph edges
///
/// Candidates of a point are the `k_nearest` edges (all if `None`) within
/// `distance` meters. Paths between the candidates of two points cost at
/// most a few times the straight line between them, through the slowest
/// edge. Trajectories that cannot be matched are left out of the result.
///
/// # Errors
///
/// Returns an error if a matched geometry cannot be cut
pub fn match_trajectories(
    graph: &ModeGraph,
    trajectories: &[Trajectory],
    distance: Meters,
    weight: Weight,
    k_nearest: Option<usize>,
) -> Result<Vec<MatchedTrajectory>, Error> {
    let rate = cost_per_meter(graph, weight);
    let matched: Vec<MatchedTrajectory> = trajectories
        .par_iter()
        .map(|t| match_trajectory(graph, t, distance, weight, k_nearest, rate))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .collect();

    info!(
        "Matched {} of {} trajectories",
        matched.len(),
        trajectories.len()
    );
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mode;
    use crate::routing::{ModalEdge, ModalStreets};
    use geo::line_string;

    fn edge(source: NodeId, target: NodeId, geometry: LineString<f64>) -> ModalEdge {
        ModalEdge {
            source,
            target,
            refid: None,
            hierarchy: None,
            access: "yes".into(),
            length: line_length(&geometry),
            time: 10.0,
            geometry,
        }
    }

    // 1 - 2 - 3 in both directions, with a branch 2 -> 4 going north
    fn graph() -> ModeGraph {
        let e12 = line_string![(x: 0.0, y: 0.0), (x: 0.001, y: 0.0)];
        let e23 = line_string![(x: 0.001, y: 0.0), (x: 0.002, y: 0.0)];
        let e24 = line_string![(x: 0.001, y: 0.0), (x: 0.001, y: 0.001)];
        ModeGraph::new(&ModalStreets {
            mode: Mode::Walk,
            edges: vec![
                edge(1, 2, e12.clone()),
                edge(2, 1, crate::spatial::reverse(&e12)),
                edge(2, 3, e23.clone()),
                edge(3, 2, crate::spatial::reverse(&e23)),
                edge(2, 4, e24),
            ],
        })
    }

    fn eastward() -> Trajectory {
        // ~ 3 m north of the street
        Trajectory {
            id: "east".into(),
            points: [0.0003, 0.0007, 0.0013, 0.0017]
                .into_iter()
                .map(|x| Coord { x, y: 0.000_027 })
                .collect(),
        }
    }

    #[test]
    fn follows_sampled_path() {
        let g = graph();
        let res = match_trajectories(&g, &[eastward()], 15.0, Weight::Time, None).unwrap();
        assert_eq!(res.len(), 1);

        let path: Vec<(NodeId, NodeId)> = res[0]
            .edges
            .iter()
            .map(|e| (e.source, e.target))
            .dedup()
            .collect();
        assert_eq!(path, vec![(1, 2), (2, 3)]);

        let stops: Vec<usize> = res[0].edges.iter().map(|e| e.stop).collect();
        assert_eq!(stops.first(), Some(&1));
        assert_eq!(stops.last(), Some(&3));
        assert!(stops.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn reversed_trajectory_uses_reverse_edges() {
        let g = graph();
        let mut t = eastward();
        t.points.reverse();
        let res = match_trajectories(&g, &[t], 15.0, Weight::Length, Some(2)).unwrap();
        let path: Vec<(NodeId, NodeId)> = res[0]
            .edges
            .iter()
            .map(|e| (e.source, e.target))
            .dedup()
            .collect();
        assert_eq!(path, vec![(3, 2), (2, 1)]);
    }

    #[test]
    fn skips_points_without_candidates() {
        let g = graph();
        let mut far = eastward();
        far.id = "far".into();
        far.points.push(Coord { x: 0.01, y: 0.01 });

        let res = match_trajectories(&g, &[far, eastward()], 15.0, Weight::Time, None).unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].id, "east");
    }

    #[test]
    fn transitions_beyond_detour_are_pruned() {
        // 1 -> 2 with a parallel edge 6 -> 7 reached from 2 through a far node 8
        let g = ModeGraph::new(&ModalStreets {
            mode: Mode::Walk,
            edges: vec![
                edge(1, 2, line_string![(x: 0.0, y: 0.0), (x: 0.001, y: 0.0)]),
                edge(6, 7, line_string![(x: 0.0, y: 0.0001), (x: 0.001, y: 0.0001)]),
                edge(2, 8, line_string![(x: 0.001, y: 0.0), (x: 0.05, y: 0.05)]),
                edge(8, 6, line_string![(x: 0.05, y: 0.05), (x: 0.0, y: 0.0001)]),
            ],
        });
        // p1 lies halfway between both streets
        let (p0, p1) = (Coord { x: 0.0003, y: 0.0 }, Coord { x: 0.0007, y: 0.00005 });
        let on_street = |point, street| {
            candidates(&g, point, 10.0, Weight::Length, None)
                .into_iter()
                .find(|c| c.street == street)
                .unwrap()
        };
        let (a, b) = (on_street(p0, 0), on_street(p1, 1));

        let mut router = Router::new(&g, Weight::Length);
        router.step(f64::INFINITY);
        assert!(router.transition(&a, &b).is_some_and(|cost| cost > 10_000.0));

        let rate = cost_per_meter(&g, Weight::Length);
        assert!((rate - 1.0).abs() < 1e-12);
        router.step(MAX_DETOUR * (haversine(p0, p1) + 20.0) * rate);
        assert!(router.transition(&a, &b).is_none());
        // the search stopped before reaching 6
        let six = g.node_index(6).unwrap();
        assert!(router.tree(a.target).cost(six).is_none());

        let t = Trajectory {
            id: "detour".into(),
            points: vec![p0, p1],
        };
        let res = match_trajectories(&g, &[t], 15.0, Weight::Length, None).unwrap();
        assert!(res[0].edges.iter().all(|e| (e.source, e.target) == (1, 2)));
    }
}
