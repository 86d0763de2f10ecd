//! Per mode accessibility of OSM ways

use crate::config::{ModalTagConfig, TagFilter};
use crate::{Mode, ModeAccess};

use super::processor::WayRecord;

const NO: &str = "no";

/// Compute the access of `conf.mode` on a way from its tags
///
/// Rules are applied in order, later rules overriding earlier ones: both,
/// oneway, sides, forward, backward, replace, no, yes_designated,
/// no_infrastructure, defaults, service and highway mappings. A `no` value
/// ends as no access at all.
pub(crate) fn append_modal(way: &mut WayRecord, conf: &ModalTagConfig, drive_right: bool) {
    let found = |filter: &TagFilter| filter.matched_value(&way.tags).map(str::to_string);
    let mut forward: Option<String> = None;
    let mut backward: Option<String> = None;

    if let Some(value) = found(&conf.both) {
        forward = Some(value.clone());
        backward = Some(value);
    }
    if let Some(value) = found(&conf.oneway) {
        if !way.oneway {
            backward = Some(value.clone());
        }
        forward = Some(value);
    }

    let (forward_side, backward_side) = if drive_right {
        (&conf.right, &conf.left)
    } else {
        (&conf.left, &conf.right)
    };
    if let Some(value) = found(forward_side) {
        forward = Some(value);
    }
    if let Some(value) = found(backward_side) {
        backward = Some(value);
    }
    if let Some(value) = found(&conf.forward) {
        forward = Some(value);
    }
    if let Some(value) = found(&conf.backward) {
        backward = Some(value);
    }

    for value in [&mut forward, &mut backward] {
        if let Some(renamed) = value.as_ref().and_then(|v| conf.replace.get(v)) {
            *value = Some(renamed.clone());
        }
    }

    if conf.exclude_filter().matches(&way.tags) {
        forward.get_or_insert_with(|| NO.to_string());
        backward.get_or_insert_with(|| NO.to_string());
    }
    if conf.yes_designated.matches(&way.tags) {
        for value in [&mut forward, &mut backward] {
            if value.as_deref() == Some("yes") {
                *value = Some("designated".to_string());
            }
        }
    }
    if conf.no_infrastructure.matches(&way.tags) {
        for value in [&mut forward, &mut backward] {
            if value.as_deref().is_some_and(|v| v != NO) {
                *value = Some("yes".to_string());
            }
        }
    }

    forward.get_or_insert_with(|| "yes".to_string());
    if !way.oneway {
        backward.get_or_insert_with(|| "yes".to_string());
    }

    if way.highway.as_deref() == Some("service")
        && let Some(mapped) = way.tags.get("service").and_then(|s| conf.map_service.get(s))
    {
        way.highway = Some(mapped.clone());
    }
    if let Some(mapped) = way.highway.as_ref().and_then(|h| conf.map_highway.get(h)) {
        for value in [&mut forward, &mut backward] {
            if value.as_deref() == Some("yes") {
                *value = Some(mapped.clone());
            }
        }
    }

    let keep = |value: Option<String>| value.filter(|v| v != NO);
    let access = if conf.mode.is_bidirectional() {
        ModeAccess {
            forward: keep(forward),
            backward: None,
        }
    } else {
        ModeAccess {
            forward: keep(forward),
            backward: keep(backward),
        }
    };
    way.access[conf.mode.index()] = access;
}

/// Bikes allowed on walkways use the walkway kind as access value
pub(crate) fn bikes_on_walkways(way: &mut WayRecord) {
    let walk = way.access[Mode::Walk.index()].forward.clone();
    let Some(walk) = walk.filter(|w| matches!(w.as_str(), "pedestrian" | "footway" | "steps"))
    else {
        return;
    };
    let bike = &mut way.access[Mode::Bike.index()];
    for value in [&mut bike.forward, &mut bike.backward] {
        if value.as_deref() == Some("yes") {
            *value = Some(walk.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OsmTagConfig;
    use crate::config::osm_tags::Tags;

    fn way(pairs: &[(&str, &str)], oneway: bool) -> WayRecord {
        let tags: Tags = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        WayRecord {
            id: 1,
            nodes: vec![1, 2],
            highway: tags.get("highway").cloned(),
            railway: None,
            junction: None,
            oneway,
            maxspeed: None,
            access: Default::default(),
            tags,
        }
    }

    fn access(w: &WayRecord, mode: Mode) -> (Option<&str>, Option<&str>) {
        let a = &w.access[mode.index()];
        (a.forward.as_deref(), a.backward.as_deref())
    }

    #[test]
    fn oneway_defaults() {
        let conf = OsmTagConfig::default();
        let mut w = way(&[("highway", "residential"), ("oneway", "yes")], true);
        append_modal(&mut w, &conf.driveways, true);
        append_modal(&mut w, &conf.walkways, true);
        assert_eq!(access(&w, Mode::Drive), (Some("yes"), None));
        assert_eq!(access(&w, Mode::Walk), (Some("yes"), None));
    }

    #[test]
    fn cycle_lanes_by_side() {
        let conf = OsmTagConfig::default();
        let mut w = way(&[("highway", "secondary"), ("cycleway:left", "lane")], false);
        append_modal(&mut w, &conf.cycleways, true);
        assert_eq!(access(&w, Mode::Bike), (Some("yes"), Some("lane")));

        let mut w = way(&[("highway", "secondary"), ("cycleway:left", "lane")], false);
        append_modal(&mut w, &conf.cycleways, false);
        assert_eq!(access(&w, Mode::Bike), (Some("lane"), Some("yes")));
    }

    #[test]
    fn forbidden_and_mapped_values() {
        let conf = OsmTagConfig::default();
        let mut w = way(&[("highway", "motorway")], true);
        append_modal(&mut w, &conf.cycleways, true);
        assert_eq!(access(&w, Mode::Bike), (None, None));

        let mut w = way(&[("highway", "cycleway")], false);
        append_modal(&mut w, &conf.cycleways, true);
        assert_eq!(access(&w, Mode::Bike), (Some("designated"), Some("designated")));

        let mut w = way(&[("highway", "footway"), ("bicycle", "yes")], false);
        append_modal(&mut w, &conf.cycleways, true);
        assert_eq!(access(&w, Mode::Bike), (Some("designated"), Some("designated")));
    }

    #[test]
    fn service_mapping_and_bus_lanes() {
        let conf = OsmTagConfig::default();
        let mut w = way(&[("highway", "service"), ("service", "bus")], false);
        append_modal(&mut w, &conf.busways, true);
        assert_eq!(w.highway.as_deref(), Some("busway"));

        let mut w = way(&[("highway", "primary"), ("busway", "lane"), ("oneway", "yes")], true);
        append_modal(&mut w, &conf.busways, true);
        assert_eq!(access(&w, Mode::Transit), (Some("lane"), None));
    }

    #[test]
    fn bikes_follow_walkways() {
        let conf = OsmTagConfig::default();
        let mut w = way(&[("highway", "pedestrian"), ("bicycle", "permissive")], false);
        append_modal(&mut w, &conf.walkways, true);
        w.access[Mode::Bike.index()] = ModeAccess::both("yes");
        bikes_on_walkways(&mut w);
        assert_eq!(access(&w, Mode::Bike), (Some("pedestrian"), Some("pedestrian")));
    }
}
