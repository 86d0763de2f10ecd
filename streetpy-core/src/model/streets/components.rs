//! Street table rows - edges and their per mode accessibility

use std::collections::BTreeMap;

use geo::LineString;
use serde::{Deserialize, Serialize};

use crate::config::constants::{
    EDGE, GEOMETRY, HIGHWAY, JUNCTION, OSMID, RAILWAY, SOURCE, SPEED, TARGET, URBAN,
};
use crate::{Error, Meters, Mode, NodeId, spatial};

/// Directional accessibility of an edge for one mode
///
/// `None` forbids the direction. Any value allows it, values other than `yes`
/// describe a dedicated infrastructure (`designated`, `lane`, `track`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModeAccess {
    pub forward: Option<String>,
    pub backward: Option<String>,
}

impl ModeAccess {
    pub fn new(forward: Option<&str>, backward: Option<&str>) -> Self {
        Self {
            forward: forward.map(str::to_string),
            backward: backward.map(str::to_string),
        }
    }

    /// Same value in both directions
    pub fn both(value: &str) -> Self {
        Self::new(Some(value), Some(value))
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_none() && self.backward.is_none()
    }

    /// Accessibility seen from the other end of the edge
    pub fn reversed(&self) -> Self {
        Self {
            forward: self.backward.clone(),
            backward: self.forward.clone(),
        }
    }
}

pub(crate) fn is_designated_value(value: Option<&str>) -> bool {
    value.is_some_and(|v| v != "yes")
}

/// Street table row, a street segment between two nodes
#[derive(Debug, Clone, PartialEq)]
pub struct StreetEdge {
    pub source: NodeId,
    pub target: NodeId,
    /// Id of the originating element, usually the OSM way id
    pub osmid: Option<i64>,
    pub highway: Option<String>,
    pub railway: Option<String>,
    pub junction: Option<String>,
    /// km/h
    pub maxspeed: Option<f64>,
    /// `None` when unknown
    pub urban: Option<bool>,
    /// Indexed by [`Mode::index`]
    pub access: [ModeAccess; 5],
    /// Free attributes, e.g. name, surface or lanes
    pub attributes: BTreeMap<String, String>,
    /// WGS84 geometry from source to target
    pub geometry: LineString<f64>,
}

impl StreetEdge {
    pub fn new(source: NodeId, target: NodeId, geometry: LineString<f64>) -> Self {
        Self {
            source,
            target,
            osmid: None,
            highway: None,
            railway: None,
            junction: None,
            maxspeed: None,
            urban: None,
            access: Default::default(),
            attributes: BTreeMap::new(),
            geometry,
        }
    }

    pub fn access(&self, mode: Mode) -> &ModeAccess {
        &self.access[mode.index()]
    }

    pub fn access_mut(&mut self, mode: Mode) -> &mut ModeAccess {
        &mut self.access[mode.index()]
    }

    pub fn set_access(&mut self, mode: Mode, access: ModeAccess) {
        self.access[mode.index()] = access;
    }

    /// Access value of a mode in a direction, bidirectional modes use the
    /// forward value both ways
    pub fn access_value(&self, mode: Mode, reverse: bool) -> Option<&str> {
        let access = self.access(mode);
        if reverse && !mode.is_bidirectional() {
            access.backward.as_deref()
        } else {
            access.forward.as_deref()
        }
    }

    /// True if the mode can use the edge in at least one direction
    pub fn is_accessible(&self, mode: Mode) -> bool {
        self.access_value(mode, false).is_some() || self.access_value(mode, true).is_some()
    }

    /// True if the edge has a dedicated infrastructure for the mode
    pub fn is_designated(&self, mode: Mode) -> bool {
        is_designated_value(self.access_value(mode, false))
            || is_designated_value(self.access_value(mode, true))
    }

    pub fn is_loop(&self) -> bool {
        self.source == self.target
    }

    pub fn length(&self) -> Meters {
        spatial::line_length(&self.geometry)
    }

    /// Road class used by a mode, `highway` or `railway`
    pub fn hierarchy(&self, mode: Mode) -> Option<&str> {
        match mode {
            Mode::Rail => self.railway.as_deref(),
            _ => self.highway.as_deref(),
        }
    }

    /// Same edge walked from target to source
    pub fn reversed(&self) -> Self {
        let mut res = self.clone();
        res.source = self.target;
        res.target = self.source;
        res.geometry = spatial::reverse(&self.geometry);
        for mode in Mode::ALL {
            if !mode.is_bidirectional() {
                res.set_access(mode, self.access(mode).reversed());
            }
        }
        res
    }

    /// Value of a column as text
    pub fn get(&self, column: &str) -> Option<String> {
        match column {
            SOURCE => Some(self.source.to_string()),
            TARGET => Some(self.target.to_string()),
            EDGE => Some(format!("({}, {})", self.source, self.target)),
            OSMID => self.osmid.map(|v| v.to_string()),
            HIGHWAY => self.highway.clone(),
            RAILWAY => self.railway.clone(),
            JUNCTION => self.junction.clone(),
            SPEED => self.maxspeed.map(|v| v.to_string()),
            URBAN => self.urban.map(|v| v.to_string()),
            GEOMETRY => None,
            _ => match Mode::from_column(column) {
                Some((mode, reverse)) => self.access_value(mode, reverse).map(str::to_string),
                None => self.attributes.get(column).cloned(),
            },
        }
    }

    /// Set the value of a column from text, `None` clears it
    pub fn set(&mut self, column: &str, value: Option<&str>) -> Result<(), Error> {
        let invalid = |v: &str| Error::InvalidData(format!("invalid value {v} for column {column}"));
        match column {
            SOURCE | TARGET => {
                let v = value.ok_or_else(|| invalid("null"))?;
                let id = parse_node_id(v).ok_or_else(|| invalid(v))?;
                if column == SOURCE {
                    self.source = id;
                } else {
                    self.target = id;
                }
            }
            OSMID => {
                self.osmid = match value {
                    Some(v) => Some(parse_node_id(v).ok_or_else(|| invalid(v))?),
                    None => None,
                }
            }
            HIGHWAY => self.highway = value.map(str::to_string),
            RAILWAY => self.railway = value.map(str::to_string),
            JUNCTION => self.junction = value.map(str::to_string),
            SPEED => {
                self.maxspeed = match value {
                    Some(v) => Some(v.trim().parse().map_err(|_| invalid(v))?),
                    None => None,
                }
            }
            URBAN => {
                self.urban = match value.map(|v| v.trim().to_lowercase()).as_deref() {
                    Some("true" | "1" | "yes") => Some(true),
                    Some("false" | "0" | "no") => Some(false),
                    Some("") | None => None,
                    Some(v) => return Err(invalid(v)),
                }
            }
            GEOMETRY | EDGE => {
                return Err(Error::InvalidData(format!("{column} cannot be set from text")));
            }
            _ => match Mode::from_column(column) {
                Some((mode, reverse)) => {
                    let access = self.access_mut(mode);
                    let value = value.map(str::to_string);
                    if reverse {
                        access.backward = value;
                    } else {
                        access.forward = value;
                    }
                }
                None => match value {
                    Some(v) => {
                        self.attributes.insert(column.to_string(), v.to_string());
                    }
                    None => {
                        self.attributes.remove(column);
                    }
                },
            },
        }
        Ok(())
    }
}

/// Integer node id, float looking values are truncated like an integer cast
pub(crate) fn parse_node_id(value: &str) -> Option<i64> {
    let value = value.trim();
    value.parse::<i64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| {
                #[allow(clippy::cast_possible_truncation)]
                let id = v.trunc() as i64;
                id
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    fn edge() -> StreetEdge {
        let mut e = StreetEdge::new(1, 2, line_string![(x: 0.0, y: 0.0), (x: 0.001, y: 0.0)]);
        e.set_access(Mode::Walk, ModeAccess::new(Some("yes"), None));
        e.set_access(Mode::Bike, ModeAccess::new(Some("lane"), None));
        e
    }

    #[test]
    fn bidirectional_mode_ignores_backward() {
        let e = edge();
        assert_eq!(e.access_value(Mode::Walk, true), Some("yes"));
        assert_eq!(e.access_value(Mode::Bike, true), None);
        assert!(e.is_accessible(Mode::Bike));
        assert!(e.is_designated(Mode::Bike));
        assert!(!e.is_designated(Mode::Walk));
        assert!(!e.is_accessible(Mode::Drive));
    }

    #[test]
    fn reversed_swaps_directional_access() {
        let r = edge().reversed();
        assert_eq!((r.source, r.target), (2, 1));
        assert_eq!(r.access(Mode::Bike).backward.as_deref(), Some("lane"));
        assert_eq!(r.access(Mode::Walk).forward.as_deref(), Some("yes"));
        assert_eq!(r.geometry.0[0].x, 0.001);
    }

    #[test]
    fn column_access() {
        let mut e = edge();
        e.set("bike_r", Some("track")).unwrap();
        e.set("surface", Some("asphalt")).unwrap();
        e.set("maxspeed", Some("30")).unwrap();
        e.set("osmid", Some("42.0")).unwrap();

        assert_eq!(e.get("bike_r").as_deref(), Some("track"));
        assert_eq!(e.get("surface").as_deref(), Some("asphalt"));
        assert_eq!(e.maxspeed, Some(30.0));
        assert_eq!(e.osmid, Some(42));
        assert_eq!(e.get("walk_r").as_deref(), Some("yes"));

        assert!(e.set("maxspeed", Some("fast")).is_err());
        assert!(e.set("geometry", Some("POINT(0 0)")).is_err());

        e.set("surface", None).unwrap();
        assert!(e.get("surface").is_none());

        assert!(e.get("urban").is_none());
        e.set("urban", Some("True")).unwrap();
        assert_eq!(e.urban, Some(true));
        e.set("urban", Some("")).unwrap();
        assert_eq!(e.urban, None);
    }
}
