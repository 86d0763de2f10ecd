//! OSM ways to an undirected multimodal street table

use geo::LineString;
use hashbrown::HashMap;
use log::{debug, info, warn};

use super::modal::{append_modal, bikes_on_walkways};
use super::reader::{OsmData, OsmWay};
use crate::algo::attributes::{default_maxspeed, urban};
use crate::config::osm_tags::Tags;
use crate::config::{OsmTagConfig, SpeedConfig};
use crate::loading::{AccessLevel, OsmOptions};
use crate::model::streets::filter_by_component;
use crate::{Error, Mode, ModeAccess, StreetEdge, StreetTable};

const LINK_SUFFIX: &str = "_link";

/// Way being processed, with its normalized tags
#[derive(Debug, Clone)]
pub(crate) struct WayRecord {
    pub id: i64,
    pub nodes: Vec<i64>,
    pub tags: Tags,
    pub highway: Option<String>,
    pub railway: Option<String>,
    pub junction: Option<String>,
    pub oneway: bool,
    /// Raw `maxspeed` tag
    pub maxspeed: Option<String>,
    pub access: [ModeAccess; 5],
}

impl WayRecord {
    fn access(&self, mode: Mode) -> &ModeAccess {
        &self.access[mode.index()]
    }

    fn is_designated(&self, mode: Mode) -> bool {
        let access = self.access(mode);
        [&access.forward, &access.backward]
            .into_iter()
            .any(|v| v.as_deref().is_some_and(|v| v != "yes"))
    }

    fn is_accessible(&self, mode: Mode) -> bool {
        !self.access(mode).is_empty()
    }
}

/// True if a way is read at all: highway ways, railways when rail is
/// requested, only railways when rail is the single mode
pub(crate) fn is_street(tags: &Tags, options: &OsmOptions) -> bool {
    if options.rail_only() {
        tags.contains_key("railway")
    } else if options.has_mode(Mode::Rail) {
        tags.contains_key("highway") || tags.contains_key("railway")
    } else {
        tags.contains_key("highway")
    }
}

/// True if a way survives the exclusion tables
pub(crate) fn is_kept(tags: &Tags, options: &OsmOptions, conf: &OsmTagConfig) -> bool {
    if !options.track && conf.track_exclude.matches(tags) {
        return false;
    }
    if !options.construction && conf.construction_exclude.matches(tags) {
        return false;
    }

    let excluded = conf.street_exclude.matches(tags)
        || match options.access_level {
            AccessLevel::All => false,
            AccessLevel::Permissive => conf.private_access.matches(tags),
            AccessLevel::Public => {
                conf.private_access.matches(tags) || conf.permissive_access.matches(tags)
            }
        };
    !excluded
        || conf.cycleways.keep_filter().matches(tags)
        || conf.busways.keep_filter().matches(tags)
}

/// Renames, links and oneway flags
fn normalize(way: &OsmWay, options: &OsmOptions, conf: &OsmTagConfig) -> WayRecord {
    let mut tags = way.tags.clone();
    let mut junction = tags.get("junction").cloned();

    let mut highway = tags.get("highway").cloned();
    if let Some(base) = highway
        .as_deref()
        .and_then(|h| h.strip_suffix(LINK_SUFFIX))
        .map(str::to_string)
    {
        tags.insert("highway".to_string(), base.clone());
        highway = Some(base);
        junction = Some("link".to_string());
    }
    let highway = highway.map(|h| conf.replace_highways.get(&h).cloned().unwrap_or(h));

    let railway = tags.get("railway").cloned().map(|r| {
        if options.has_mode(Mode::Rail) {
            conf.replace_railways.get(&r).cloned().unwrap_or(r)
        } else {
            r
        }
    });
    let junction = junction.map(|j| conf.replace_junctions.get(&j).cloned().unwrap_or(j));

    let mut nodes = way.nodes.clone();
    let mut oneway = tags.get("oneway").map(String::as_str);
    if oneway == Some("-1") {
        nodes.reverse();
    }
    if oneway.is_none() && junction.as_deref() == Some("roundabout") {
        oneway = Some("1");
    }
    let oneway = matches!(oneway, Some("yes" | "1" | "-1"));

    WayRecord {
        id: way.id,
        nodes,
        maxspeed: tags.get("maxspeed").cloned(),
        tags,
        highway,
        railway,
        junction,
        oneway,
        access: Default::default(),
    }
}

/// Ways usable by the requested modes, with their access
fn modal_ways(
    ways: &[OsmWay],
    options: &OsmOptions,
    conf: &OsmTagConfig,
) -> Vec<WayRecord> {
    let mut res = Vec::with_capacity(ways.len());
    for way in ways {
        if !is_street(&way.tags, options) || !is_kept(&way.tags, options, conf) {
            continue;
        }
        let mut record = normalize(way, options, conf);
        for mode in &options.modes {
            append_modal(&mut record, conf.modal(*mode), options.drive_right);
        }
        if options.modes.iter().all(|mode| !record.is_accessible(*mode)) {
            continue;
        }
        if options.has_mode(Mode::Bike) && options.has_mode(Mode::Walk) {
            bikes_on_walkways(&mut record);
        }
        if filter_record(&mut record, options) {
            res.push(record);
        }
    }
    res
}

/// Railway, service, sidewalk and path filters, false drops the way
fn filter_record(way: &mut WayRecord, options: &OsmOptions) -> bool {
    let designated = |way: &WayRecord| {
        (options.has_mode(Mode::Bike) && way.is_designated(Mode::Bike))
            || (options.has_mode(Mode::Transit) && way.is_designated(Mode::Transit))
    };

    if way
        .railway
        .as_deref()
        .is_some_and(|r| matches!(r, "disused" | "abandoned" | "dismantled"))
    {
        if !designated(way) {
            return false;
        }
        way.railway = None;
    }

    if options.access_level != AccessLevel::All
        && way.highway.as_deref() == Some("service")
        && !designated(way)
    {
        return false;
    }

    if options.has_mode(Mode::Walk)
        && options.has_mode(Mode::Bike)
        && way.highway.as_deref() == Some("footway")
        && way
            .tags
            .get("footway")
            .is_some_and(|f| matches!(f.as_str(), "sidewalk" | "crossing" | "access_aisle"))
        && !way.is_accessible(Mode::Bike)
    {
        return false;
    }

    if options.has_mode(Mode::Bike) && way.highway.as_deref() == Some("path") {
        if !way.is_designated(Mode::Bike) {
            return false;
        }
        way.highway = Some("cycleway".to_string());
    }
    true
}

/// Split ways at nodes shared with other ways, self loops are dropped
fn split_ways(
    ways: &[WayRecord],
    data: &OsmData,
    conf: &OsmTagConfig,
) -> (Vec<StreetEdge>, Vec<Option<String>>) {
    let mut uses: HashMap<i64, usize> = HashMap::new();
    for way in ways {
        for node in &way.nodes {
            *uses.entry(*node).or_insert(0) += 1;
        }
    }

    let mut edges = Vec::new();
    let mut maxspeeds = Vec::new();
    let mut missing = 0;
    for way in ways {
        let Some(coords) = way
            .nodes
            .iter()
            .map(|id| data.nodes.get(id).copied())
            .collect::<Option<Vec<_>>>()
        else {
            missing += 1;
            continue;
        };
        if coords.len() < 2 {
            continue;
        }

        let mut start = 0;
        for i in 1..way.nodes.len() {
            let last = i == way.nodes.len() - 1;
            if !last && uses.get(&way.nodes[i]).copied().unwrap_or(0) < 2 {
                continue;
            }
            let (source, target) = (way.nodes[start], way.nodes[i]);
            let geometry = LineString::new(coords[start..=i].to_vec());
            start = i;
            if source == target {
                continue;
            }

            let mut edge = StreetEdge::new(source, target, geometry);
            edge.osmid = Some(way.id);
            edge.highway.clone_from(&way.highway);
            edge.railway.clone_from(&way.railway);
            edge.junction.clone_from(&way.junction);
            edge.access.clone_from(&way.access);
            for key in &conf.highway_attrs {
                if let Some(value) = way.tags.get(key) {
                    edge.attributes.insert(key.clone(), value.clone());
                }
            }
            edges.push(edge);
            maxspeeds.push(way.maxspeed.clone());
        }
    }
    if missing > 0 {
        warn!("{missing} ways with missing node coordinates dropped");
    }
    (edges, maxspeeds)
}

fn urban_mask(edge: &StreetEdge, options: &OsmOptions) -> bool {
    let not_motorway = edge.highway.as_deref() != Some("motorway");
    if options.rail_only() {
        edge.railway.is_some()
    } else if options.has_mode(Mode::Rail) {
        edge.railway.is_some() || not_motorway
    } else {
        not_motorway
    }
}

/// Street table from ways already read in memory
///
/// # Errors
///
/// Returns an error if no mode is requested or the tag configuration is
/// inconsistent
pub fn process_ways(
    data: &OsmData,
    options: &OsmOptions,
    conf: &OsmTagConfig,
    speeds: &SpeedConfig,
) -> Result<StreetTable, Error> {
    options.validate()?;
    conf.validate()?;

    let ways = modal_ways(&data.ways, options, conf);
    debug!("{} of {} ways kept", ways.len(), data.ways.len());

    let (edges, maxspeeds) = split_ways(&ways, data, conf);
    let mut table = StreetTable::new(edges, options.modes.clone(), false);
    info!("Split ways into {} edges", table.len());

    let mask: Vec<bool> = table.edges.iter().map(|e| urban_mask(e, options)).collect();
    let urban_edges = urban(&table.filter(&mask), 50.0, 10, 100);
    let mut urban_iter = urban_edges.into_iter();
    for (edge, in_mask) in table.edges.iter_mut().zip(&mask) {
        edge.urban = Some(*in_mask && urban_iter.next().unwrap_or(false));
    }

    let defaults = speeds.speed_defaults(options.country.as_deref());
    for (edge, raw) in table.edges.iter_mut().zip(&maxspeeds) {
        let mut is_urban = edge.urban.unwrap_or(false);
        let speed = default_maxspeed(raw.as_deref(), edge.highway.as_deref(), &mut is_urban, &defaults);
        edge.urban = Some(is_urban);
        edge.maxspeed = Some(speed);
    }

    let table = if options.has_mode(Mode::Rail) {
        let (rail, other): (Vec<StreetEdge>, Vec<StreetEdge>) =
            table.edges.iter().cloned().partition(|e| e.railway.is_some());
        let mut connected = filter_by_component(&table.with_edges(other), None);
        connected.edges.extend(rail);
        connected
    } else {
        filter_by_component(&table, None)
    };

    info!(
        "Street table with {} edges, {} urban",
        table.len(),
        table.edges.iter().filter(|e| e.urban == Some(true)).count()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn data() -> OsmData {
        let nodes = [
            (1, 0.0, 0.0),
            (2, 0.001, 0.0),
            (3, 0.002, 0.0),
            (11, 0.0025, 0.0),
            (4, 0.003, 0.0),
            (5, 0.004, 0.0),
            (6, 0.005, 0.0),
            (7, 0.0, 0.001),
            (8, 0.006, 0.0),
            (12, 0.0025, 0.001),
        ]
        .into_iter()
        .map(|(id, x, y)| (id, Coord { x, y }))
        .collect();

        let way = |id: i64, nodes: &[i64], pairs: &[(&str, &str)]| OsmWay {
            id,
            nodes: nodes.to_vec(),
            tags: tags(pairs),
        };
        OsmData {
            ways: vec![
                way(10, &[1, 2], &[("highway", "residential"), ("oneway", "yes"), ("maxspeed", "FR:urban")]),
                way(11, &[2, 3], &[("highway", "primary"), ("oneway", "-1")]),
                way(12, &[3, 11, 4], &[("highway", "residential"), ("oneway", "yes"), ("cycleway", "opposite")]),
                way(13, &[4, 5], &[("highway", "secondary_link"), ("busway", "lane"), ("maxspeed", "30 mph")]),
                way(14, &[5, 6], &[("highway", "path"), ("bicycle", "designated")]),
                way(15, &[6, 8], &[("highway", "footway"), ("footway", "sidewalk")]),
                way(16, &[1, 7], &[("highway", "service")]),
                way(17, &[11, 12], &[("highway", "residential"), ("name", "Side street")]),
                way(18, &[7, 12], &[("waterway", "river")]),
            ],
            relations: Vec::new(),
            nodes,
        }
    }

    fn streets() -> StreetTable {
        let options = OsmOptions {
            modes: vec![Mode::Walk, Mode::Bike, Mode::Transit, Mode::Drive],
            ..OsmOptions::default()
        };
        process_ways(&data(), &options, &OsmTagConfig::default(), &SpeedConfig::default()).unwrap()
    }

    fn edges_of(table: &StreetTable, osmid: i64) -> Vec<&StreetEdge> {
        table.edges.iter().filter(|e| e.osmid == Some(osmid)).collect()
    }

    fn access(edge: &StreetEdge, mode: Mode) -> (Option<&str>, Option<&str>) {
        let a = edge.access(mode);
        (a.forward.as_deref(), a.backward.as_deref())
    }

    #[test]
    fn oneway_and_reversed_oneway() {
        let table = streets();
        let e = edges_of(&table, 10)[0];
        assert_eq!(access(e, Mode::Drive), (Some("yes"), None));
        assert_eq!(access(e, Mode::Walk), (Some("yes"), None));

        let e = edges_of(&table, 11)[0];
        assert_eq!((e.source, e.target), (3, 2));
        assert_eq!(access(e, Mode::Drive), (Some("yes"), None));
    }

    #[test]
    fn split_at_shared_nodes() {
        let table = streets();
        let parts: Vec<(i64, i64)> = edges_of(&table, 12).iter().map(|e| (e.source, e.target)).collect();
        assert_eq!(parts, vec![(3, 11), (11, 4)]);
        // bikes may ride against the oneway
        assert_eq!(access(edges_of(&table, 12)[0], Mode::Bike), (Some("yes"), Some("opposite")));
        assert_eq!(
            edges_of(&table, 17)[0].attributes.get("name").map(String::as_str),
            Some("Side street")
        );
    }

    #[test]
    fn links_bus_lanes_and_paths() {
        let table = streets();
        let e = edges_of(&table, 13)[0];
        assert_eq!(e.highway.as_deref(), Some("secondary"));
        assert_eq!(e.junction.as_deref(), Some("link"));
        assert_eq!(access(e, Mode::Transit), (Some("lane"), Some("lane")));

        let e = edges_of(&table, 14)[0];
        assert_eq!(e.highway.as_deref(), Some("cycleway"));
        assert_eq!(access(e, Mode::Bike), (Some("designated"), Some("designated")));
        assert_eq!(access(e, Mode::Drive), (None, None));
    }

    #[test]
    fn drops_sidewalks_services_and_others() {
        let table = streets();
        for osmid in [15, 16, 18] {
            assert!(edges_of(&table, osmid).is_empty(), "way {osmid} kept");
        }
        assert_eq!(table.len(), 7);
    }

    #[test]
    fn max_speeds_from_tags_and_defaults() {
        let table = streets();
        let e = edges_of(&table, 10)[0];
        assert_eq!(e.urban, Some(true));
        assert_eq!(e.maxspeed, Some(50.0));

        let e = edges_of(&table, 13)[0];
        assert!((e.maxspeed.unwrap() - 30.0 * 1.60934).abs() < 1e-9);

        // not urban, residential has no highway default
        assert_eq!(edges_of(&table, 17)[0].maxspeed, Some(90.0));
    }

    #[test]
    fn rail_only_reads_railways() {
        let mut d = data();
        d.ways.push(OsmWay {
            id: 20,
            nodes: vec![7, 8],
            tags: tags(&[("railway", "narrow_gauge")]),
        });
        let options = OsmOptions {
            modes: vec![Mode::Rail],
            ..OsmOptions::default()
        };
        let table =
            process_ways(&d, &options, &OsmTagConfig::default(), &SpeedConfig::default()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.edges[0].railway.as_deref(), Some("rail"));
        assert_eq!(access(&table.edges[0], Mode::Rail), (Some("yes"), Some("yes")));
    }
}
