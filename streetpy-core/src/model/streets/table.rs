//! Multimodal street table

use std::collections::BTreeSet;

use itertools::Itertools;

use super::components::StreetEdge;
use crate::config::constants::{EDGE, GEOMETRY, base_columns, mode_columns, optional_columns};
use crate::{Error, Mode};

/// Street edges with per mode accessibility
///
/// Undirected tables hold one row per street segment, with forward and
/// backward access values. Directed tables (see
/// [`to_single_mode`](crate::routing::to_single_mode)) hold one row per
/// travel direction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreetTable {
    pub edges: Vec<StreetEdge>,
    /// Mode columns present in the table
    pub modes: Vec<Mode>,
    pub directed: bool,
}

impl StreetTable {
    pub fn new(edges: Vec<StreetEdge>, modes: Vec<Mode>, directed: bool) -> Self {
        let modes = modes.into_iter().sorted().dedup().collect();
        Self {
            edges,
            modes,
            directed,
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreetEdge> {
        self.edges.iter()
    }

    pub fn has_mode(&self, mode: Mode) -> bool {
        self.modes.contains(&mode)
    }

    /// Error if the mode column is missing
    pub fn check_mode(&self, mode: Mode) -> Result<(), Error> {
        if self.has_mode(mode) {
            Ok(())
        } else {
            Err(Error::MissingColumn(mode.column().to_string()))
        }
    }

    /// Table with the same columns and the edges matching the mask
    pub fn filter(&self, mask: &[bool]) -> Self {
        let edges = self
            .edges
            .iter()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|(edge, _)| edge.clone())
            .collect();
        self.with_edges(edges)
    }

    /// Table with the same columns and other edges
    pub fn with_edges(&self, edges: Vec<StreetEdge>) -> Self {
        Self {
            edges,
            modes: self.modes.clone(),
            directed: self.directed,
        }
    }

    /// Attribute keys used by at least one edge, sorted
    pub fn attribute_columns(&self) -> Vec<String> {
        self.edges
            .iter()
            .flat_map(|edge| edge.attributes.keys())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect()
    }
}

/// Street columns of the table: base, optional columns in use, modes,
/// geometry and edge
pub fn street_columns(table: &StreetTable) -> Vec<&'static str> {
    let mut columns: Vec<&'static str> = base_columns().to_vec();
    columns.extend(
        optional_columns()
            .into_iter()
            .filter(|column| table.edges.iter().any(|e| e.get(column).is_some())),
    );
    columns.extend(street_mode_columns(table));
    columns.push(GEOMETRY);
    columns.push(EDGE);
    columns
}

/// Mode columns of the table in the canonical order
pub fn street_mode_columns(table: &StreetTable) -> Vec<&'static str> {
    mode_columns()
        .into_iter()
        .filter(|column| {
            Mode::from_column(column).is_some_and(|(mode, _)| table.has_mode(mode))
        })
        .collect()
}

/// True if every edge has a geometry, at least one mode column exists and a
/// base column is populated
pub fn is_valid_street(table: &StreetTable) -> bool {
    let geometries = table.edges.iter().all(|e| e.geometry.0.len() >= 2);
    let base = table
        .edges
        .iter()
        .any(|e| e.maxspeed.is_some() || e.highway.is_some() || e.railway.is_some());
    geometries && !table.modes.is_empty() && (base || table.is_empty())
}

/// Per edge mask of edges usable by the mode
pub fn is_accessible(table: &StreetTable, mode: Mode) -> Result<Vec<bool>, Error> {
    table.check_mode(mode)?;
    Ok(table.edges.iter().map(|e| e.is_accessible(mode)).collect())
}

/// Per edge mask of edges with a dedicated infrastructure for the mode
pub fn is_designated(table: &StreetTable, mode: Mode) -> Result<Vec<bool>, Error> {
    table.check_mode(mode)?;
    Ok(table.edges.iter().map(|e| e.is_designated(mode)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModeAccess;
    use geo::line_string;

    fn table() -> StreetTable {
        let mut a = StreetEdge::new(1, 2, line_string![(x: 0.0, y: 0.0), (x: 0.001, y: 0.0)]);
        a.highway = Some("residential".into());
        a.set_access(Mode::Walk, ModeAccess::both("yes"));
        a.set_access(Mode::Drive, ModeAccess::new(None, Some("yes")));

        let mut b = StreetEdge::new(2, 3, line_string![(x: 0.001, y: 0.0), (x: 0.002, y: 0.0)]);
        b.highway = Some("cycleway".into());
        b.set_access(Mode::Bike, ModeAccess::new(Some("designated"), None));

        StreetTable::new(vec![a, b], vec![Mode::Drive, Mode::Walk, Mode::Bike], false)
    }

    #[test]
    fn columns_in_canonical_order() {
        let t = table();
        assert_eq!(
            street_mode_columns(&t),
            vec!["walk", "bike", "drive", "bike_r", "drive_r"]
        );
        let columns = street_columns(&t);
        assert_eq!(columns[..2], ["maxspeed", "highway"]);
        assert_eq!(columns.last(), Some(&"edge"));
        assert!(!columns.contains(&"urban"));

        let mut t = t;
        t.edges[1].urban = Some(false);
        t.edges[0].junction = Some("roundabout".into());
        assert_eq!(street_columns(&t)[2..4], ["urban", "junction"]);
    }

    #[test]
    fn masks() {
        let t = table();
        assert_eq!(is_accessible(&t, Mode::Drive).unwrap(), vec![true, false]);
        assert_eq!(is_accessible(&t, Mode::Walk).unwrap(), vec![true, false]);
        assert_eq!(is_designated(&t, Mode::Bike).unwrap(), vec![false, true]);
        assert!(matches!(
            is_accessible(&t, Mode::Rail),
            Err(Error::MissingColumn(_))
        ));
    }

    #[test]
    fn validity() {
        let mut t = table();
        assert!(is_valid_street(&t));
        t.edges[0].geometry = line_string![];
        assert!(!is_valid_street(&t));
        assert!(!is_valid_street(&StreetTable::default()));
    }

    #[test]
    fn filter_keeps_columns() {
        let t = table();
        let f = t.filter(&[false, true]);
        assert_eq!(f.len(), 1);
        assert_eq!(f.modes, t.modes);
        assert_eq!(f.edges[0].source, 2);
    }
}
