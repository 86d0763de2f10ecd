#![allow(dead_code)]

use geo::line_string;
use streetpy_core::{Mode, ModeAccess, NodeId, StreetEdge, StreetTable};

/// Grid spacing in degrees, ~111 m
pub const STEP: f64 = 0.001;

/// Node id of a grid position
pub fn node(n: usize, row: usize, col: usize) -> NodeId {
    (row * n + col + 1) as NodeId
}

/// `n x n` grid of residential two way streets at 36 km/h, drive and walk
pub fn grid(n: usize) -> StreetTable {
    let mut edges = Vec::new();
    for row in 0..n {
        for col in 0..n {
            let (x, y) = (col as f64 * STEP, row as f64 * STEP);
            if col + 1 < n {
                edges.push(street(
                    node(n, row, col),
                    node(n, row, col + 1),
                    (x, y),
                    (x + STEP, y),
                ));
            }
            if row + 1 < n {
                edges.push(street(
                    node(n, row, col),
                    node(n, row + 1, col),
                    (x, y),
                    (x, y + STEP),
                ));
            }
        }
    }
    StreetTable::new(edges, vec![Mode::Walk, Mode::Drive], false)
}

fn street(source: NodeId, target: NodeId, from: (f64, f64), to: (f64, f64)) -> StreetEdge {
    let mut edge = StreetEdge::new(
        source,
        target,
        line_string![(x: from.0, y: from.1), (x: to.0, y: to.1)],
    );
    edge.highway = Some("residential".to_string());
    edge.maxspeed = Some(36.0);
    edge.set_access(Mode::Drive, ModeAccess::both("yes"));
    edge.set_access(Mode::Walk, ModeAccess::new(Some("yes"), None));
    edge
}
