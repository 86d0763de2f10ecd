//! Two pass OSM PBF reading: tagged elements first, node coordinates then

use std::path::Path;

use geo::Coord;
use hashbrown::{HashMap, HashSet};
use log::{debug, info, warn};
use osmpbf::{Element, ElementReader, RelMemberType};

use crate::Error;
use crate::config::osm_tags::Tags;

/// OSM way with its node refs and tags
#[derive(Debug, Clone, PartialEq)]
pub struct OsmWay {
    pub id: i64,
    pub nodes: Vec<i64>,
    pub tags: Tags,
}

/// Multipolygon relation, outer and inner member way ids
#[derive(Debug, Clone, PartialEq)]
pub struct OsmRelation {
    pub id: i64,
    pub outer: Vec<i64>,
    pub inner: Vec<i64>,
    pub tags: Tags,
}

/// Ways and the coordinates of their nodes
#[derive(Debug, Clone, Default)]
pub struct OsmData {
    pub ways: Vec<OsmWay>,
    pub relations: Vec<OsmRelation>,
    pub nodes: HashMap<i64, Coord<f64>>,
}

impl OsmData {
    /// Coordinates of a way, `None` if a node is missing
    pub fn way_coords(&self, way: &OsmWay) -> Option<Vec<Coord<f64>>> {
        way.nodes.iter().map(|id| self.nodes.get(id).copied()).collect()
    }
}

fn collect_tags<'a>(tags: impl Iterator<Item = (&'a str, &'a str)>) -> Tags {
    tags.map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn read_nodes(path: &Path, data: &mut OsmData) -> Result<(), Error> {
    let needed: HashSet<i64> = data
        .ways
        .iter()
        .flat_map(|way| way.nodes.iter().copied())
        .collect();

    ElementReader::from_path(path)?.for_each(|element| match element {
        Element::Node(node) if needed.contains(&node.id()) => {
            data.nodes.insert(
                node.id(),
                Coord {
                    x: node.lon(),
                    y: node.lat(),
                },
            );
        }
        Element::DenseNode(node) if needed.contains(&node.id()) => {
            data.nodes.insert(
                node.id(),
                Coord {
                    x: node.lon(),
                    y: node.lat(),
                },
            );
        }
        _ => {}
    })?;

    let missing = needed.len().saturating_sub(data.nodes.len());
    if missing > 0 {
        warn!("{missing} way nodes are missing from the file");
    }
    Ok(())
}

/// Read ways whose tags are accepted by `keep`, and their nodes
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded
pub fn read_ways<P: AsRef<Path>>(path: P, keep: impl Fn(&Tags) -> bool) -> Result<OsmData, Error> {
    let path = path.as_ref();
    let mut data = OsmData::default();

    ElementReader::from_path(path)?.for_each(|element| {
        if let Element::Way(way) = element {
            let tags = collect_tags(way.tags());
            if keep(&tags) {
                data.ways.push(OsmWay {
                    id: way.id(),
                    nodes: way.refs().collect(),
                    tags,
                });
            }
        }
    })?;
    debug!("Read {} ways", data.ways.len());

    read_nodes(path, &mut data)?;
    info!(
        "Read {} ways and {} nodes from {}",
        data.ways.len(),
        data.nodes.len(),
        path.display()
    );
    Ok(data)
}

/// Read closed ways and multipolygon relations accepted by `keep`
///
/// Member ways of relations are read whatever their tags. Relation members
/// are stored as ways too, with empty tags when not accepted on their own.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded
pub fn read_areas<P: AsRef<Path>>(path: P, keep: impl Fn(&Tags) -> bool) -> Result<OsmData, Error> {
    let path = path.as_ref();
    let mut data = OsmData::default();

    ElementReader::from_path(path)?.for_each(|element| {
        if let Element::Relation(relation) = element {
            let tags = collect_tags(relation.tags());
            if tags.get("type").map(String::as_str) != Some("multipolygon") || !keep(&tags) {
                return;
            }
            let mut outer = Vec::new();
            let mut inner = Vec::new();
            for member in relation.members() {
                if !matches!(member.member_type, RelMemberType::Way) {
                    continue;
                }
                match member.role() {
                    Ok("inner") => inner.push(member.member_id),
                    _ => outer.push(member.member_id),
                }
            }
            data.relations.push(OsmRelation {
                id: relation.id(),
                outer,
                inner,
                tags,
            });
        }
    })?;

    let members: HashSet<i64> = data
        .relations
        .iter()
        .flat_map(|r| r.outer.iter().chain(&r.inner).copied())
        .collect();

    ElementReader::from_path(path)?.for_each(|element| {
        if let Element::Way(way) = element {
            let tags = collect_tags(way.tags());
            let refs: Vec<i64> = way.refs().collect();
            let closed = refs.len() >= 4 && refs.first() == refs.last();
            if closed && keep(&tags) {
                data.ways.push(OsmWay {
                    id: way.id(),
                    nodes: refs,
                    tags,
                });
            } else if members.contains(&way.id()) {
                data.ways.push(OsmWay {
                    id: way.id(),
                    nodes: refs,
                    tags: Tags::new(),
                });
            }
        }
    })?;
    debug!(
        "Read {} area ways and {} multipolygons",
        data.ways.len(),
        data.relations.len()
    );

    read_nodes(path, &mut data)?;
    Ok(data)
}
