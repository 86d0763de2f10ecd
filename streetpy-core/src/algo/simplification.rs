//! Street table simplification: arc merging, loop and dead end removal,
//! zone filtering

use fixedbitset::FixedBitSet;
use geo::{BoundingRect, Intersects, LineString};
use hashbrown::HashMap;
use log::{debug, info};

use crate::config::ZoneConfig;
use crate::loading::osm::Zone;
use crate::model::streets::{degree, filter_by_component, is_designated};
use crate::spatial::{linemerge, reverse};
use crate::{Error, MAX_SIMPLIFY_ITER, Meters, Mode, ModeAccess, NodeId, StreetEdge, StreetTable};

/// Dead end arcs removed by [`simplify`]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Deadend {
    /// Keep every dead end
    #[default]
    Keep,
    /// Drop every dead end
    All,
    /// Drop dead ends up to a length
    MaxLength(Meters),
}

/// Chain of edges between crossings, each edge with its travel orientation
#[derive(Debug, Clone)]
struct Arc {
    edges: Vec<(usize, bool)>,
    source: NodeId,
    target: NodeId,
}

fn oriented_ends(edge: &StreetEdge, reversed: bool) -> (NodeId, NodeId) {
    if reversed {
        (edge.target, edge.source)
    } else {
        (edge.source, edge.target)
    }
}

fn oriented_access(edge: &StreetEdge, reversed: bool, modes: &[Mode]) -> Vec<ModeAccess> {
    modes
        .iter()
        .map(|mode| {
            let access = edge.access(*mode);
            if reversed && !mode.is_bidirectional() {
                access.reversed()
            } else {
                access.clone()
            }
        })
        .collect()
}

struct ArcBuilder<'a> {
    table: &'a StreetTable,
    refid: Option<&'a str>,
    degrees: HashMap<NodeId, usize>,
    incident: HashMap<NodeId, Vec<usize>>,
}

impl<'a> ArcBuilder<'a> {
    fn new(table: &'a StreetTable, refid: Option<&'a str>) -> Self {
        let mut incident: HashMap<NodeId, Vec<usize>> = HashMap::new();
        for (i, edge) in table.edges.iter().enumerate() {
            incident.entry(edge.source).or_default().push(i);
            if edge.target != edge.source {
                incident.entry(edge.target).or_default().push(i);
            }
        }
        Self {
            table,
            refid,
            degrees: degree(table),
            incident,
        }
    }

    /// Edge continuing `from` through `node`, oriented away from `node`
    fn continuation(&self, node: NodeId, from: (usize, bool)) -> Option<(usize, bool)> {
        if self.degrees.get(&node) != Some(&2) {
            return None;
        }
        let next = *self.incident.get(&node)?.iter().find(|i| **i != from.0)?;
        let next_edge = &self.table.edges[next];
        if next_edge.is_loop() {
            return None;
        }
        let next_reversed = next_edge.source != node;

        let edge = &self.table.edges[from.0];
        // `from` arrives in `node` when its oriented target is `node`
        let (a, b) = if oriented_ends(edge, from.1).1 == node {
            (from, (next, next_reversed))
        } else {
            ((next, !next_reversed), from)
        };
        self.compatible(a, b).then_some((next, next_reversed))
    }

    /// Two oriented edges, `a` followed by `b`, can be merged
    fn compatible(&self, a: (usize, bool), b: (usize, bool)) -> bool {
        let (ea, eb) = (&self.table.edges[a.0], &self.table.edges[b.0]);
        if let Some(column) = self.refid
            && ea.get(column) != eb.get(column)
        {
            return false;
        }
        oriented_access(ea, a.1, &self.table.modes) == oriented_access(eb, b.1, &self.table.modes)
    }

    fn arcs(&self) -> Vec<Arc> {
        let n = self.table.len();
        let mut visited = FixedBitSet::with_capacity(n);
        let mut arcs = Vec::new();

        for i in 0..n {
            if visited.put(i) {
                continue;
            }
            let edge = &self.table.edges[i];
            let mut chain = std::collections::VecDeque::from([(i, false)]);

            if !edge.is_loop() {
                // forward from the target
                let mut node = edge.target;
                let mut last = (i, false);
                while let Some(next) = self.continuation(node, last) {
                    if visited.put(next.0) {
                        break;
                    }
                    chain.push_back(next);
                    node = oriented_ends(&self.table.edges[next.0], next.1).1;
                    last = next;
                }

                // backward from the source, edges oriented toward the chain
                let mut node = edge.source;
                let mut first = (i, false);
                while let Some((next, away)) = self.continuation(node, first) {
                    if visited.put(next) {
                        break;
                    }
                    let oriented = (next, !away);
                    chain.push_front(oriented);
                    node = oriented_ends(&self.table.edges[next], oriented.1).0;
                    first = oriented;
                }
            }

            let (source, _) = oriented_ends(&self.table.edges[chain[0].0], chain[0].1);
            let last = chain[chain.len() - 1];
            let (_, target) = oriented_ends(&self.table.edges[last.0], last.1);
            arcs.push(Arc {
                edges: chain.into_iter().collect(),
                source,
                target,
            });
        }
        arcs
    }
}

fn arc_length(table: &StreetTable, arc: &Arc) -> Meters {
    arc.edges.iter().map(|(i, _)| table.edges[*i].length()).sum()
}

/// Merge the edges of an arc into one edge, attributes of the first edge
fn merge_arc(table: &StreetTable, arc: &Arc) -> StreetEdge {
    let (first, reversed) = arc.edges[0];
    let mut res = if reversed {
        table.edges[first].reversed()
    } else {
        table.edges[first].clone()
    };
    if arc.edges.len() == 1 {
        return res;
    }

    let parts: Vec<LineString<f64>> = arc
        .edges
        .iter()
        .map(|(i, reversed)| {
            let geometry = &table.edges[*i].geometry;
            if *reversed { reverse(geometry) } else { geometry.clone() }
        })
        .collect();
    res.geometry = linemerge(&parts);
    res.source = arc.source;
    res.target = arc.target;
    res
}

/// Simplify an undirected street table
///
/// Keeps the largest component (or components of `min_size` edges), removes
/// arcs looping on themselves and dead end arcs, then merges every arc into
/// a single edge. With `refid`, arcs only chain edges sharing the same value
/// of that column.
///
/// # Errors
///
/// Returns an error if the table is directed
pub fn simplify(
    streets: &StreetTable,
    refid: Option<&str>,
    deadend: Deadend,
    min_size: Option<usize>,
) -> Result<StreetTable, Error> {
    if streets.directed {
        return Err(Error::InvalidData(
            "streets must not be directed".to_string(),
        ));
    }

    let mut df = filter_by_component(streets, min_size);

    let mut size = usize::MAX;
    let mut iteration = 0;
    while size != df.len() && iteration <= MAX_SIMPLIFY_ITER {
        size = df.len();
        iteration += 1;

        let builder = ArcBuilder::new(&df, refid);
        let arcs = builder.arcs();
        let mut keep = vec![true; df.len()];

        for arc in &arcs {
            let is_loop = arc.source == arc.target;
            let is_deadend = builder.degrees.get(&arc.source) == Some(&1)
                || builder.degrees.get(&arc.target) == Some(&1);
            let drop_deadend = is_deadend
                && match deadend {
                    Deadend::Keep => false,
                    Deadend::All => true,
                    Deadend::MaxLength(max) => arc_length(&df, arc) <= max,
                };
            if is_loop || drop_deadend {
                for (i, _) in &arc.edges {
                    keep[*i] = false;
                }
            }
        }
        df = df.filter(&keep);
    }
    debug!("Simplification converged after {iteration} rounds");

    let arcs = ArcBuilder::new(&df, refid).arcs();
    let edges: Vec<StreetEdge> = arcs.iter().map(|arc| merge_arc(&df, arc)).collect();

    info!(
        "Simplified {} edges into {} edges",
        streets.len(),
        edges.len()
    );
    Ok(df.with_edges(edges))
}

/// Polygon zone with an access level (`permissive` or `restrictive`)
pub trait AccessZone {
    fn access_level(&self) -> &str;
    fn intersects_line(&self, line: &geo::LineString<f64>) -> bool;
}

impl AccessZone for Zone {
    fn access_level(&self) -> &str {
        &self.access_level
    }

    fn intersects_line(&self, line: &geo::LineString<f64>) -> bool {
        let bbox_hit = match (self.geometry.bounding_rect(), line.bounding_rect()) {
            (Some(a), Some(b)) => a.intersects(&b),
            _ => false,
        };
        bbox_hit && self.geometry.intersects(line)
    }
}

/// Remove edges inside zones depending on the zone access level
///
/// An edge is removed when it intersects a zone and one of its columns holds
/// a value listed for the zone access level in `zone_config.removed`. Edges
/// designated to a kept mode are never removed.
pub fn filter_zones<Z: AccessZone>(
    streets: &StreetTable,
    zones: &[Z],
    zone_config: &ZoneConfig,
    keep_bike: bool,
    keep_transit: bool,
    keep_rail: bool,
) -> Result<StreetTable, Error> {
    let mut designated = vec![false; streets.len()];
    for (mode, keep) in [
        (Mode::Rail, keep_rail),
        (Mode::Bike, keep_bike),
        (Mode::Transit, keep_transit),
    ] {
        if keep && streets.has_mode(mode) {
            for (d, m) in designated.iter_mut().zip(is_designated(streets, mode)?) {
                *d |= m;
            }
        }
    }

    let mask: Vec<bool> = streets
        .edges
        .iter()
        .zip(&designated)
        .map(|(edge, designated)| {
            *designated
                || !zones.iter().any(|zone| {
                    zone_config
                        .removed
                        .get(zone.access_level())
                        .is_some_and(|filter| {
                            filter.0.iter().any(|rule| {
                                edge.get(&rule.key)
                                    .is_some_and(|value| rule.matches_value(&value))
                            })
                        })
                        && zone.intersects_line(&edge.geometry)
                })
        })
        .collect();

    let res = streets.filter(&mask);
    info!(
        "Zone filter removed {} of {} edges",
        streets.len() - res.len(),
        streets.len()
    );
    Ok(res)
}
