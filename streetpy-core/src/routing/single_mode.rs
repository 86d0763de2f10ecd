//! Extraction of a directed single mode street table

use geo::LineString;
use hashbrown::HashMap;
use log::info;

use super::graph::Weight;
use crate::algo::attributes::base_travel_time;
use crate::algo::simplification::{Deadend, simplify};
use crate::config::SpeedConfig;
use crate::model::streets::is_accessible;
use crate::{Error, Meters, Mode, ModeAccess, NodeId, Seconds, StreetTable};

/// Directed edge of a single mode
#[derive(Debug, Clone, PartialEq)]
pub struct ModalEdge {
    pub source: NodeId,
    pub target: NodeId,
    /// Value of the reference id column of the merged edges
    pub refid: Option<String>,
    /// Road class of the mode (`highway` or `railway`)
    pub hierarchy: Option<String>,
    /// Access value of the mode in the edge direction
    pub access: String,
    pub length: Meters,
    pub time: Seconds,
    pub geometry: LineString<f64>,
}

impl ModalEdge {
    pub fn weight(&self, weight: Weight) -> f64 {
        match weight {
            Weight::Time => self.time,
            Weight::Length => self.length,
        }
    }
}

/// Directed street table of a single mode, with travel times
#[derive(Debug, Clone, PartialEq)]
pub struct ModalStreets {
    pub mode: Mode,
    pub edges: Vec<ModalEdge>,
}

impl ModalStreets {
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModalEdge> {
        self.edges.iter()
    }

    /// Same edges with other travel times
    pub fn with_times(&self, times: &[Seconds]) -> Result<Self, Error> {
        if times.len() != self.edges.len() {
            return Err(Error::InvalidData(format!(
                "expected {} travel times, got {}",
                self.edges.len(),
                times.len()
            )));
        }
        let edges = self
            .edges
            .iter()
            .zip(times)
            .map(|(edge, time)| ModalEdge {
                time: *time,
                ..edge.clone()
            })
            .collect();
        Ok(Self {
            mode: self.mode,
            edges,
        })
    }
}

/// Extract a directed, simplified table of a single mode
///
/// Edges are merged between crossings, backward edges get a reversed
/// geometry and duplicated `(source, target)` pairs keep the fastest edge.
///
/// # Errors
///
/// Returns an error if the mode column is missing or a travel time cannot be
/// computed
pub fn to_single_mode(
    streets: &StreetTable,
    refid: Option<&str>,
    mode: Mode,
    speeds: &SpeedConfig,
) -> Result<ModalStreets, Error> {
    let mask = is_accessible(streets, mode)?;
    let mut df = streets.filter(&mask);

    // drop other modal columns
    df.modes = vec![mode];
    for edge in &mut df.edges {
        for other in Mode::ALL.into_iter().filter(|m| *m != mode) {
            edge.set_access(other, ModeAccess::default());
        }
    }

    let df = simplify(&df, refid, Deadend::Keep, None)?;

    let mut directed = Vec::with_capacity(df.len() * 2);
    for edge in &df.edges {
        if edge.is_loop() {
            continue;
        }
        if let Some(value) = edge.access_value(mode, false) {
            let mut forward = edge.clone();
            forward.set_access(mode, ModeAccess::new(Some(value), None));
            directed.push(forward);
        }
        if !mode.is_bidirectional() && edge.access_value(mode, true).is_none() {
            continue;
        }
        let mut backward = edge.reversed();
        let value = backward.access_value(mode, false).map(str::to_string);
        backward.set_access(mode, ModeAccess::new(value.as_deref(), None));
        if value.is_some() {
            directed.push(backward);
        }
    }

    let mut directed = StreetTable::new(directed, vec![mode], true);
    let times = base_travel_time(&directed, mode, speeds)?;

    // drop duplicated edges, keep smallest time
    let mut fastest: HashMap<(NodeId, NodeId), usize> = HashMap::with_capacity(times.len());
    for (i, edge) in directed.edges.iter().enumerate() {
        fastest
            .entry((edge.source, edge.target))
            .and_modify(|best| {
                if times[i] < times[*best] {
                    *best = i;
                }
            })
            .or_insert(i);
    }

    let edges: Vec<ModalEdge> = directed
        .edges
        .drain(..)
        .enumerate()
        .filter(|(i, edge)| fastest[&(edge.source, edge.target)] == *i)
        .map(|(i, edge)| ModalEdge {
            source: edge.source,
            target: edge.target,
            refid: refid.and_then(|column| edge.get(column)),
            hierarchy: edge.hierarchy(mode).map(str::to_string),
            access: edge
                .access_value(mode, false)
                .unwrap_or("yes")
                .to_string(),
            length: edge.length(),
            time: times[i],
            geometry: edge.geometry,
        })
        .collect();

    info!(
        "Extracted {} directed {} edges from {} streets",
        edges.len(),
        mode,
        streets.len()
    );

    Ok(ModalStreets { mode, edges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StreetEdge;
    use geo::line_string;

    fn street(source: NodeId, target: NodeId, drive: ModeAccess, speed: f64) -> StreetEdge {
        #[allow(clippy::cast_precision_loss)]
        let (x0, x1) = (source as f64 * 0.001, target as f64 * 0.001);
        let mut e = StreetEdge::new(source, target, line_string![(x: x0, y: 0.0), (x: x1, y: 0.0)]);
        e.osmid = Some(source);
        e.highway = Some("primary".into());
        e.maxspeed = Some(speed);
        e.set_access(Mode::Drive, drive);
        e.set_access(Mode::Walk, ModeAccess::both("yes"));
        e
    }

    #[test]
    fn splits_directions() {
        let table = StreetTable::new(
            vec![
                street(1, 2, ModeAccess::both("yes"), 50.0),
                street(2, 3, ModeAccess::new(Some("yes"), None), 50.0),
                street(3, 4, ModeAccess::new(None, Some("yes")), 50.0),
            ],
            vec![Mode::Walk, Mode::Drive],
            false,
        );
        let modal = to_single_mode(&table, Some("osmid"), Mode::Drive, &SpeedConfig::default())
            .unwrap();

        let pairs: Vec<(NodeId, NodeId)> = modal.iter().map(|e| (e.source, e.target)).collect();
        assert_eq!(pairs, vec![(1, 2), (2, 1), (2, 3), (4, 3)]);

        let back = &modal.edges[3];
        assert!(back.geometry.0[0].x > back.geometry.0[1].x);
        assert!(modal.iter().all(|e| e.time > 0.0));
        assert_eq!(back.refid.as_deref(), Some("3"));
    }

    #[test]
    fn walk_is_bidirectional() {
        let table = StreetTable::new(
            vec![
                street(1, 2, ModeAccess::default(), 50.0),
                street(2, 3, ModeAccess::default(), 50.0),
            ],
            vec![Mode::Walk, Mode::Drive],
            false,
        );
        let modal =
            to_single_mode(&table, Some("osmid"), Mode::Walk, &SpeedConfig::default()).unwrap();
        assert_eq!(modal.len(), 4);
        // 4 km/h walking speed
        let expected = modal.edges[0].length * 3.6 / 4.0;
        assert!((modal.edges[0].time - expected).abs() < 1e-9);
    }

    #[test]
    fn keeps_fastest_duplicate() {
        let mut slow = street(1, 2, ModeAccess::new(Some("yes"), None), 20.0);
        slow.geometry = line_string![(x: 0.001, y: 0.0), (x: 0.0015, y: 0.0005), (x: 0.002, y: 0.0)];
        slow.osmid = Some(7);
        let table = StreetTable::new(
            vec![
                street(1, 2, ModeAccess::new(Some("yes"), None), 50.0),
                slow,
                street(2, 3, ModeAccess::both("yes"), 50.0),
            ],
            vec![Mode::Drive],
            false,
        );
        let modal = to_single_mode(&table, Some("osmid"), Mode::Drive, &SpeedConfig::default())
            .unwrap();
        let one_two: Vec<&ModalEdge> = modal
            .iter()
            .filter(|e| (e.source, e.target) == (1, 2))
            .collect();
        assert_eq!(one_two.len(), 1);
        assert_eq!(one_two[0].refid.as_deref(), Some("1"));
    }

    #[test]
    fn missing_mode() {
        let table = StreetTable::new(vec![], vec![Mode::Walk], false);
        assert!(matches!(
            to_single_mode(&table, None, Mode::Bike, &SpeedConfig::default()),
            Err(Error::MissingColumn(_))
        ));
    }
}
