//! Zones inside which some streets are removed

use std::collections::BTreeMap;
use std::path::Path;

use geo::{Area, BooleanOps, Contains, Coord, Intersects, LineString, MapCoords, MultiPolygon, Polygon};
use hashbrown::HashMap;
use log::{debug, info};

use super::reader::{OsmData, OsmWay, read_areas};
use crate::config::ZoneConfig;
use crate::config::osm_tags::Tags;
use crate::loading::AccessLevel;
use crate::spatial::LocalProjection;
use crate::{Error, Meters};

pub const PERMISSIVE: &str = "permissive";
pub const RESTRICTIVE: &str = "restrictive";

/// Zone polygon, `access_level` is `permissive` or `restrictive`
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub access_level: String,
    pub geometry: MultiPolygon<f64>,
    pub tags: BTreeMap<String, String>,
}

fn zone_filter(access_level: AccessLevel, config: &ZoneConfig) -> impl Fn(&Tags) -> bool + '_ {
    move |tags: &Tags| match access_level {
        AccessLevel::All => false,
        AccessLevel::Permissive => config.restricted_zones.matches(tags),
        AccessLevel::Public => {
            config.permissive_zones.matches(tags) || config.restricted_zones.matches(tags)
        }
    }
}

/// Area in square meters
fn area(polygon: &Polygon<f64>) -> Meters {
    let Some(origin) = polygon.exterior().0.first().copied() else {
        return 0.0;
    };
    let projection = LocalProjection::new(origin);
    polygon.map_coords(|c| projection.project(c)).unsigned_area()
}

/// Join open member ways into closed rings
fn assemble_rings(mut parts: Vec<Vec<Coord<f64>>>) -> Vec<LineString<f64>> {
    let mut rings = Vec::new();
    while let Some(mut ring) = parts.pop() {
        while ring.len() > 1 && ring.first() != ring.last() {
            let Some(end) = ring.last().copied() else {
                break;
            };
            let Some(pos) = parts
                .iter()
                .position(|p| p.first() == Some(&end) || p.last() == Some(&end))
            else {
                break;
            };
            let mut next = parts.swap_remove(pos);
            if next.first() != Some(&end) {
                next.reverse();
            }
            ring.extend(next.into_iter().skip(1));
        }
        if ring.len() >= 4 && ring.first() == ring.last() {
            rings.push(LineString::new(ring));
        }
    }
    rings
}

/// Zone polygons from areas already read in memory
///
/// Overlapping polygons of the same access level are dissolved, each
/// resulting polygon keeps the tags of the first zone it covers.
pub fn zones_from_areas(
    data: &OsmData,
    access_level: AccessLevel,
    config: &ZoneConfig,
    min_area: Option<Meters>,
) -> Vec<Zone> {
    let keep = zone_filter(access_level, config);
    let mut polygons: Vec<(Polygon<f64>, &Tags)> = Vec::new();

    let ways: HashMap<i64, &OsmWay> = data.ways.iter().map(|w| (w.id, w)).collect();
    for way in &data.ways {
        if !keep(&way.tags) {
            continue;
        }
        if let Some(coords) = data.way_coords(way) {
            polygons.push((Polygon::new(LineString::new(coords), vec![]), &way.tags));
        }
    }

    for relation in data.relations.iter().filter(|r| keep(&r.tags)) {
        let parts = |ids: &[i64]| -> Vec<Vec<Coord<f64>>> {
            ids.iter()
                .filter_map(|id| ways.get(id))
                .filter_map(|way| data.way_coords(way))
                .collect()
        };
        let outers = assemble_rings(parts(&relation.outer));
        let inners = assemble_rings(parts(&relation.inner));

        let mut shells: Vec<(LineString<f64>, Vec<LineString<f64>>)> =
            outers.into_iter().map(|ring| (ring, Vec::new())).collect();
        for inner in inners {
            let Some(first) = inner.0.first().copied() else {
                continue;
            };
            if let Some(shell) = shells
                .iter_mut()
                .find(|(outer, _)| Polygon::new(outer.clone(), vec![]).contains(&first))
            {
                shell.1.push(inner);
            }
        }
        for (outer, holes) in shells {
            polygons.push((Polygon::new(outer, holes), &relation.tags));
        }
    }

    let before = polygons.len();
    polygons.retain(|(polygon, _)| min_area.is_none_or(|min| area(polygon) >= min));
    debug!("{} of {before} zone polygons above the minimum area", polygons.len());

    let mut zones = Vec::new();
    for level in [PERMISSIVE, RESTRICTIVE] {
        let members: Vec<&(Polygon<f64>, &Tags)> = polygons
            .iter()
            .filter(|(_, tags)| {
                let restricted = config.restricted_zones.matches(tags);
                (level == RESTRICTIVE) == restricted
            })
            .collect();

        let dissolved = members
            .iter()
            .fold(MultiPolygon::new(vec![]), |acc, (polygon, _)| {
                acc.union(&MultiPolygon::new(vec![polygon.clone()]))
            });

        for polygon in dissolved {
            let tags = members
                .iter()
                .find(|(member, _)| member.intersects(&polygon))
                .map(|(_, tags)| {
                    tags.iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect::<BTreeMap<_, _>>()
                })
                .unwrap_or_default();
            zones.push(Zone {
                access_level: level.to_string(),
                geometry: MultiPolygon::new(vec![polygon]),
                tags,
            });
        }
    }
    zones
}

/// Zones excluding some streets, `None` for access level `all`
///
/// `min_area` drops zone polygons smaller than this area, in square meters.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded
pub fn osm_excluding_zones<P: AsRef<Path>>(
    path: P,
    access_level: AccessLevel,
    config: &ZoneConfig,
    min_area: Option<Meters>,
) -> Result<Option<Vec<Zone>>, Error> {
    if access_level == AccessLevel::All {
        return Ok(None);
    }

    let data = read_areas(path, zone_filter(access_level, config))?;
    let zones = zones_from_areas(&data, access_level, config, min_area);
    info!("Found {} excluding zones", zones.len());
    Ok(Some(zones))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loading::osm::reader::OsmRelation;

    fn square(id: i64, first_node: i64, x: f64, size: f64, tags: &[(&str, &str)]) -> (OsmWay, Vec<(i64, Coord<f64>)>) {
        let coords = [(x, x), (x + size, x), (x + size, x + size), (x, x + size)];
        let nodes: Vec<(i64, Coord<f64>)> = coords
            .iter()
            .enumerate()
            .map(|(i, (x, y))| (first_node + i as i64, Coord { x: *x, y: *y }))
            .collect();
        let mut refs: Vec<i64> = nodes.iter().map(|n| n.0).collect();
        refs.push(first_node);
        let way = OsmWay {
            id,
            nodes: refs,
            tags: tags.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect(),
        };
        (way, nodes)
    }

    fn data() -> OsmData {
        let mut data = OsmData::default();
        for (way, nodes) in [
            square(1, 10, 0.0, 0.001, &[("leisure", "park")]),
            // overlaps the park
            square(2, 20, 0.0005, 0.001, &[("landuse", "retail")]),
            square(3, 30, 0.01, 0.001, &[("landuse", "military")]),
            square(4, 40, 0.02, 0.00001, &[("leisure", "garden")]),
            square(5, 50, 0.03, 0.001, &[("building", "yes")]),
        ] {
            data.ways.push(way);
            data.nodes.extend(nodes);
        }
        data
    }

    #[test]
    fn dissolves_by_access_level() {
        let zones = zones_from_areas(&data(), AccessLevel::Public, &ZoneConfig::default(), Some(100.0));
        let levels: Vec<&str> = zones.iter().map(|z| z.access_level.as_str()).collect();
        assert_eq!(levels, vec![PERMISSIVE, RESTRICTIVE]);
        assert_eq!(zones[0].tags.get("leisure").map(String::as_str), Some("park"));
        assert_eq!(zones[1].tags.get("landuse").map(String::as_str), Some("military"));
    }

    #[test]
    fn permissive_level_reads_restricted_zones_only() {
        let zones = zones_from_areas(&data(), AccessLevel::Permissive, &ZoneConfig::default(), None);
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].access_level, RESTRICTIVE);
    }

    #[test]
    fn multipolygon_relations() {
        let mut data = OsmData::default();
        let (mut outer, nodes) = square(1, 10, 0.0, 0.002, &[]);
        outer.tags.clear();
        let (inner, inner_nodes) = square(2, 20, 0.0005, 0.0005, &[]);
        data.ways.extend([outer, inner]);
        data.nodes.extend(nodes);
        data.nodes.extend(inner_nodes);
        data.relations.push(OsmRelation {
            id: 100,
            outer: vec![1],
            inner: vec![2],
            tags: [("type", "multipolygon"), ("landuse", "cemetery")]
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        });

        let zones = zones_from_areas(&data, AccessLevel::Public, &ZoneConfig::default(), None);
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].geometry.0[0].interiors().len(), 1);
    }

    #[test]
    fn rings_from_open_parts() {
        let c = |x: f64, y: f64| Coord { x, y };
        let rings = assemble_rings(vec![
            vec![c(0.0, 0.0), c(1.0, 0.0), c(1.0, 1.0)],
            vec![c(0.0, 0.0), c(0.0, 1.0), c(1.0, 1.0)],
        ]);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].0.len(), 5);
    }

    #[test]
    fn no_zones_for_all_access() {
        let res = osm_excluding_zones("missing.pbf", AccessLevel::All, &ZoneConfig::default(), None);
        assert!(matches!(res, Ok(None)));
    }
}
