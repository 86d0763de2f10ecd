//! Attribute inference: speed units, urban context and travel times

use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use log::{debug, info};
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::config::constants::unit_conversion;
use crate::config::{SpeedConfig, SpeedDefaults, SpeedProfile};
use crate::model::streets::{connected_components, node_coordinates};
use crate::routing::ModalStreets;
use crate::spatial::LocalProjection;
use crate::{Error, Mode, NodeId, Seconds, StreetTable};

/// Convert a `"<number> <unit>"` text to km/h
///
/// Plain numbers pass through, unknown units keep the number and a text
/// that does not start with a number is `None`.
pub fn convert_unit(text: &str) -> Option<f64> {
    let mut parts = text.split_whitespace();
    let number: f64 = parts.next()?.parse().ok()?;
    let factor = parts.next().and_then(unit_conversion).unwrap_or(1.0);
    Some(number * factor)
}

/// Max speed of an edge from its raw OSM `maxspeed` tag
///
/// Country zone values (`FR:urban`, `DE:rural`, ...) are not speeds, they
/// update `urban` and the speed falls back to the defaults: urban speed,
/// highway speed, then the `else` speed.
pub fn default_maxspeed(
    raw: Option<&str>,
    highway: Option<&str>,
    urban: &mut bool,
    defaults: &SpeedDefaults,
) -> f64 {
    let speed = match raw {
        Some(text) if text.contains(':') => {
            match text.get(3..) {
                Some("urban") => *urban = true,
                Some("rural") => *urban = false,
                _ => {}
            }
            None
        }
        Some(text) => convert_unit(text),
        None => None,
    };

    speed
        .or_else(|| urban.then_some(defaults.urban))
        .or_else(|| highway.and_then(|h| defaults.highway.get(h).copied()))
        .unwrap_or(defaults.other)
}

/// Urban context of every edge
///
/// Nodes are clustered with DBSCAN (`distance` meters, `size` neighbours
/// including the node itself). Clusters with more than `cluster_size` nodes
/// mark their edges, and connected groups of more than `cluster_size` marked
/// edges are urban.
pub fn urban(table: &StreetTable, distance: f64, size: usize, cluster_size: usize) -> Vec<bool> {
    let coords = node_coordinates(table);
    let Some(origin) = coords.values().next().copied() else {
        return vec![false; table.len()];
    };
    let projection = LocalProjection::new(origin);

    let ids: Vec<NodeId> = coords.keys().copied().collect();
    let tree: RTree<GeomWithData<[f64; 2], usize>> = RTree::bulk_load(
        ids.iter()
            .enumerate()
            .map(|(i, id)| {
                let p = projection.project(coords[id]);
                GeomWithData::new([p.x, p.y], i)
            })
            .collect(),
    );

    let labels = dbscan(&tree, ids.len(), distance, size);

    let mut cluster_sizes: HashMap<usize, usize> = HashMap::new();
    for label in labels.iter().flatten() {
        *cluster_sizes.entry(*label).or_insert(0) += 1;
    }
    let clustered: HashSet<NodeId> = ids
        .iter()
        .zip(&labels)
        .filter(|(_, label)| label.is_some_and(|l| cluster_sizes[&l] > cluster_size))
        .map(|(id, _)| *id)
        .collect();

    // edges in a cluster
    let mask: Vec<bool> = table
        .edges
        .iter()
        .map(|e| clustered.contains(&e.source) || clustered.contains(&e.target))
        .collect();
    let in_cluster = table.filter(&mask);

    let components = connected_components(&in_cluster);
    let mut component_sizes: HashMap<usize, usize> = HashMap::new();
    for c in &components {
        *component_sizes.entry(*c).or_insert(0) += 1;
    }
    let mut urban_edges = components
        .iter()
        .map(|c| component_sizes[c] > cluster_size);

    let res: Vec<bool> = mask
        .iter()
        .map(|keep| *keep && urban_edges.next().unwrap_or(false))
        .collect();

    debug!(
        "{} of {} edges in an urban context",
        res.iter().filter(|u| **u).count(),
        table.len()
    );
    res
}

/// Cluster label of every point, `None` for noise
fn dbscan(
    tree: &RTree<GeomWithData<[f64; 2], usize>>,
    count: usize,
    distance: f64,
    size: usize,
) -> Vec<Option<usize>> {
    let mut positions = vec![[0.0; 2]; count];
    for p in tree.iter() {
        positions[p.data] = *p.geom();
    }
    let neighbours = |i: usize| -> Vec<usize> {
        tree.locate_within_distance(positions[i], distance * distance)
            .map(|p| p.data)
            .collect()
    };

    let mut labels: Vec<Option<usize>> = vec![None; count];
    let mut visited = vec![false; count];
    let mut cluster = 0;

    for i in 0..count {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let seeds = neighbours(i);
        if seeds.len() < size {
            continue;
        }

        labels[i] = Some(cluster);
        let mut queue = seeds;
        while let Some(j) = queue.pop() {
            if labels[j].is_none() {
                labels[j] = Some(cluster);
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;
            let next = neighbours(j);
            if next.len() >= size {
                queue.extend(next);
            }
        }
        cluster += 1;
    }
    labels
}

/// Speed in km/h of every edge for a mode
fn mode_speeds(table: &StreetTable, mode: Mode, speeds: &SpeedConfig) -> Vec<Option<f64>> {
    let conf = speeds.mode(mode);
    table
        .edges
        .iter()
        .map(|edge| match conf.replace_maxspeed {
            Some(speed) => Some(speed),
            None => edge
                .maxspeed
                .or(conf.default)
                .map(|speed| conf.max.map_or(speed, |max| speed.min(max))),
        })
        .collect()
}

/// Travel time in seconds of every edge for a mode
///
/// # Errors
///
/// Returns an error if a speed is 0 or missing
pub fn base_travel_time(
    table: &StreetTable,
    mode: Mode,
    speeds: &SpeedConfig,
) -> Result<Vec<Seconds>, Error> {
    table
        .edges
        .iter()
        .zip(mode_speeds(table, mode, speeds))
        .map(|(edge, speed)| match speed {
            Some(speed) if speed > 0.0 => Ok(edge.length() * 3.6 / speed),
            _ => Err(Error::InvalidData(format!(
                "speed cannot be 0 or missing (edge {} - {})",
                edge.source, edge.target
            ))),
        })
        .collect()
}

/// Hours of the interpolation points of a day
const KEY_HOURS: [f64; 10] = [0.0, 5.0, 7.0, 11.0, 11.5, 13.0, 14.0, 18.0, 21.0, 24.0];

/// Speed ratio of a time of day, between 0 and 1
///
/// `slow_speed` is the peak hour speed ratio, clipped below to
/// `profile.max_slow`. Midday speeds are interpolated between
/// `profile.midday_min` and `profile.midday_max`.
///
/// # Errors
///
/// Returns an error if `midday_min` is smaller than `midday_max`
pub fn time_ratio(slow_speed: f64, time: (u32, u32), profile: &SpeedProfile) -> Result<f64, Error> {
    if profile.midday_min < profile.midday_max {
        return Err(Error::InvalidData(
            "midday_min must be bigger than midday_max".to_string(),
        ));
    }

    let s = slow_speed.max(profile.max_slow);
    let spread = profile.midday_min - profile.midday_max;
    let m = if spread > 0.0 {
        let a = (1.0 - s) / spread;
        (a * s + 1.0 - profile.midday_min * a).clamp(s, 1.0)
    } else if s >= profile.midday_min {
        1.0
    } else {
        s
    };

    // peaks on the 3rd, 4th, 7th and 8th points, midday on 5th and 6th
    let values = [1.0, 1.0, s, s, m, m, s, s, 1.0, 1.0];

    let minutes = f64::from(time.0 * 60 + time.1).clamp(0.0, 24.0 * 60.0);
    let hour = minutes / 60.0;

    let i = KEY_HOURS
        .iter()
        .rposition(|h| *h <= hour)
        .unwrap_or(0)
        .min(KEY_HOURS.len() - 2);
    let (h0, h1) = (KEY_HOURS[i], KEY_HOURS[i + 1]);
    let t = (hour - h0) / (h1 - h0);
    Ok(values[i] + t * (values[i + 1] - values[i]))
}

/// Travel times slowed down by congestion at a time of day
///
/// `ratios` gives the peak speed ratio of hierarchy values, edges of other
/// hierarchy values keep their base time.
///
/// # Errors
///
/// Returns an error on an invalid profile
pub fn congested_travel_time(
    streets: &ModalStreets,
    ratios: &BTreeMap<String, f64>,
    time: (u32, u32),
    profile: &SpeedProfile,
) -> Result<Vec<Seconds>, Error> {
    let by_hierarchy: BTreeMap<&str, f64> = ratios
        .iter()
        .map(|(k, v)| Ok((k.as_str(), time_ratio(*v, time, profile)?)))
        .collect::<Result<_, Error>>()?;

    info!(
        "Congested {} travel times at {:02}:{:02}",
        streets.mode, time.0, time.1
    );

    Ok(streets
        .edges
        .iter()
        .map(|edge| {
            let ratio = edge
                .hierarchy
                .as_deref()
                .and_then(|h| by_hierarchy.get(h))
                .copied()
                .unwrap_or(1.0);
            edge.time / ratio
        })
        .collect())
}
