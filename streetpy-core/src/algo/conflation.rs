//! Conflation of street attributes from a secondary source

use geo::{BoundingRect, Coord, LineString};
use log::{debug, info};
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};

use crate::spatial::{angle_difference, envelope, line_bearing, line_locate, sample_points};
use crate::{Error, Meters, Mode, StreetEdge, StreetTable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflationConfig {
    /// Max distance in meters between sampled points and a candidate
    pub max_distance: Meters,
    /// Max bearing difference in degrees, whatever the direction
    pub max_angle: f64,
    /// Distance in meters between sampled points of primary edges
    pub sample_step: Meters,
    /// Min share of sampled points close to a candidate
    pub min_overlap: f64,
    /// Columns copied from the secondary table
    pub columns: Vec<String>,
    /// Replace values already set in the primary table
    pub overwrite: bool,
}

impl Default for ConflationConfig {
    fn default() -> Self {
        Self {
            max_distance: 15.0,
            max_angle: 30.0,
            sample_step: 10.0,
            min_overlap: 0.5,
            columns: vec!["maxspeed".to_string()],
            overwrite: false,
        }
    }
}

/// Secondary edge matched to a primary edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeMatch {
    pub secondary: usize,
    pub overlap: f64,
    pub mean_distance: Meters,
    /// The secondary edge runs against the primary edge
    pub reversed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConflationReport {
    pub matched: usize,
    pub unmatched: usize,
    /// Match of every primary edge
    pub matches: Vec<Option<EdgeMatch>>,
}

struct SecondaryEdge {
    envelope: AABB<[f64; 2]>,
    index: usize,
}

impl RTreeObject for SecondaryEdge {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn line_envelope(line: &LineString<f64>, distance: Meters) -> Option<AABB<[f64; 2]>> {
    let rect = line.bounding_rect()?;
    let min = envelope(rect.min(), distance).min();
    let max = envelope(rect.max(), distance).max();
    Some(AABB::from_corners([min.x, min.y], [max.x, max.y]))
}

/// Column read on a secondary edge running the other way
fn opposite_column(column: &str) -> Option<&'static str> {
    let (mode, reverse) = Mode::from_column(column)?;
    if mode.is_bidirectional() {
        return None;
    }
    if reverse {
        Some(mode.column())
    } else {
        mode.reverse_column()
    }
}

fn best_match(
    edge: &StreetEdge,
    secondary: &StreetTable,
    tree: &RTree<SecondaryEdge>,
    config: &ConflationConfig,
) -> Option<EdgeMatch> {
    let search = line_envelope(&edge.geometry, config.max_distance)?;
    let bearing = line_bearing(&edge.geometry)?;
    let samples: Vec<Coord<f64>> = sample_points(&edge.geometry, config.sample_step);
    if samples.is_empty() {
        return None;
    }

    tree.locate_in_envelope_intersecting(&search)
        .filter_map(|candidate| {
            let other = &secondary.edges[candidate.index];
            let diff = angle_difference(bearing, line_bearing(&other.geometry)?);
            if diff.min(180.0 - diff) > config.max_angle {
                return None;
            }

            let close: Vec<Meters> = samples
                .iter()
                .filter_map(|p| line_locate(&other.geometry, *p))
                .map(|location| location.offset)
                .filter(|offset| *offset <= config.max_distance)
                .collect();
            #[allow(clippy::cast_precision_loss)]
            let overlap = close.len() as f64 / samples.len() as f64;
            if close.is_empty() || overlap < config.min_overlap {
                return None;
            }
            #[allow(clippy::cast_precision_loss)]
            let mean_distance = close.iter().sum::<f64>() / close.len() as f64;

            Some(EdgeMatch {
                secondary: candidate.index,
                overlap,
                mean_distance,
                reversed: diff > 90.0,
            })
        })
        .max_by(|a, b| {
            a.overlap
                .total_cmp(&b.overlap)
                .then(b.mean_distance.total_cmp(&a.mean_distance))
                .then(b.secondary.cmp(&a.secondary))
        })
}

/// Copy column values of matching secondary edges into the primary table
///
/// A secondary edge matches a primary edge when it is roughly parallel and
/// close enough to a share of points sampled along the primary edge. Mode
/// columns of reversed matches are read from the opposite direction column.
///
/// # Errors
///
/// Returns an error if a copied value is invalid for its column
pub fn conflate(
    primary: &StreetTable,
    secondary: &StreetTable,
    config: &ConflationConfig,
) -> Result<(StreetTable, ConflationReport), Error> {
    let tree = RTree::bulk_load(
        secondary
            .edges
            .iter()
            .enumerate()
            .filter_map(|(index, edge)| {
                line_envelope(&edge.geometry, 0.0).map(|envelope| SecondaryEdge { envelope, index })
            })
            .collect(),
    );

    let mut res = primary.clone();
    for column in &config.columns {
        if let Some((mode, _)) = Mode::from_column(column)
            && !res.has_mode(mode)
        {
            res.modes.push(mode);
            res.modes.sort();
        }
    }

    let mut report = ConflationReport::default();
    for edge in &mut res.edges {
        let found = best_match(edge, secondary, &tree, config);
        report.matches.push(found);
        let Some(found) = found else {
            report.unmatched += 1;
            continue;
        };
        report.matched += 1;

        let other = &secondary.edges[found.secondary];
        for column in &config.columns {
            let read = if found.reversed {
                opposite_column(column).unwrap_or(column.as_str())
            } else {
                column.as_str()
            };
            let Some(value) = other.get(read) else {
                continue;
            };
            if config.overwrite || edge.get(column).is_none() {
                edge.set(column, Some(value.as_str()))?;
            }
        }
    }

    debug!("Conflation matches: {:?}", report.matches);
    info!(
        "Conflated {} of {} edges",
        report.matched,
        primary.len()
    );
    Ok((res, report))
}
