//! OpenStreetMap tag tables driving street extraction
//!
//! Filters are ordered lists of `key = [values]` rules. An empty value list
//! matches any value of the key. When several rules of a filter match a way,
//! the last one wins.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{Error, Mode};

/// Tags of an OSM element
pub type Tags = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRule {
    pub key: String,
    #[serde(default)]
    pub values: Vec<String>,
}

impl TagRule {
    pub fn matches_value(&self, value: &str) -> bool {
        self.values.is_empty() || self.values.iter().any(|v| v == value)
    }

    fn matched<'a>(&self, tags: &'a Tags) -> Option<&'a str> {
        tags.get(&self.key)
            .map(String::as_str)
            .filter(|value| self.matches_value(value))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagFilter(pub Vec<TagRule>);

impl TagFilter {
    pub fn new(rules: &[(&str, &[&str])]) -> Self {
        Self(
            rules
                .iter()
                .map(|(key, values)| TagRule {
                    key: (*key).to_string(),
                    values: values.iter().map(|v| (*v).to_string()).collect(),
                })
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, tags: &Tags) -> bool {
        self.0.iter().any(|rule| rule.matched(tags).is_some())
    }

    /// Value of the last matching rule
    pub fn matched_value<'a>(&self, tags: &'a Tags) -> Option<&'a str> {
        self.0.iter().filter_map(|rule| rule.matched(tags)).last()
    }

    /// True if a rule on `key` accepts `value`
    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.0
            .iter()
            .any(|rule| rule.key == key && rule.matches_value(value))
    }

    /// Union of two filters, a rule accepting any value absorbs the other
    pub fn merge(&mut self, other: &TagFilter) {
        for rule in &other.0 {
            match self.0.iter_mut().find(|r| r.key == rule.key) {
                Some(existing) if existing.values.is_empty() => {}
                Some(existing) if rule.values.is_empty() => existing.values.clear(),
                Some(existing) => {
                    for value in &rule.values {
                        if !existing.values.contains(value) {
                            existing.values.push(value.clone());
                        }
                    }
                }
                None => self.0.push(rule.clone()),
            }
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

fn mapping(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// How a mode reads OSM tags
///
/// * `both`: accessible in both directions, whatever the oneway
/// * `oneway`: accessible in the driving direction, both if not oneway
/// * `left` / `right`: accessible on a side of the street, the direction
///   depends on the driving side
/// * `forward` / `backward`: accessible along / against the way direction
/// * `no`: forbidden unless another rule gave access
/// * `yes_designated`: plain `yes` becomes `designated`
/// * `no_infrastructure`: access without dedicated infrastructure is `yes`
/// * `replace`: value renames
/// * `map_highway`: highway value -> access value of plain `yes`
/// * `map_service`: service value -> highway value of service highways
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalTagConfig {
    pub mode: Mode,
    #[serde(default)]
    pub both: TagFilter,
    #[serde(default)]
    pub oneway: TagFilter,
    #[serde(default)]
    pub left: TagFilter,
    #[serde(default)]
    pub right: TagFilter,
    #[serde(default)]
    pub forward: TagFilter,
    #[serde(default)]
    pub backward: TagFilter,
    #[serde(default)]
    pub no: TagFilter,
    #[serde(default)]
    pub yes_designated: TagFilter,
    #[serde(default)]
    pub no_infrastructure: TagFilter,
    #[serde(default)]
    pub replace: BTreeMap<String, String>,
    #[serde(default)]
    pub map_highway: BTreeMap<String, String>,
    #[serde(default)]
    pub map_service: BTreeMap<String, String>,
}

impl ModalTagConfig {
    fn empty(mode: Mode) -> Self {
        Self {
            mode,
            both: TagFilter::default(),
            oneway: TagFilter::default(),
            left: TagFilter::default(),
            right: TagFilter::default(),
            forward: TagFilter::default(),
            backward: TagFilter::default(),
            no: TagFilter::default(),
            yes_designated: TagFilter::default(),
            no_infrastructure: TagFilter::default(),
            replace: BTreeMap::new(),
            map_highway: BTreeMap::new(),
            map_service: BTreeMap::new(),
        }
    }

    /// Ways matching this filter are always useful to the mode
    pub fn keep_filter(&self) -> TagFilter {
        let mut res = TagFilter::default();
        for filter in [
            &self.both,
            &self.oneway,
            &self.left,
            &self.right,
            &self.forward,
            &self.backward,
        ] {
            res.merge(filter);
        }
        res
    }

    /// Ways matching this filter are never usable by the mode
    pub fn exclude_filter(&self) -> &TagFilter {
        &self.no
    }
}

/// Zones (parks, industrial areas, ...) inside which some streets are removed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Zones where non permissive access streets are removed
    pub permissive_zones: TagFilter,
    /// Zones where most streets are removed
    pub restricted_zones: TagFilter,
    /// Zone access level -> street column values removed inside the zone
    pub removed: BTreeMap<String, TagFilter>,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            permissive_zones: TagFilter::new(&[
                (
                    "landuse",
                    &[
                        "cemetery",
                        "industrial",
                        "retail",
                        "commercial",
                        "garages",
                        "allotments",
                        "quarry",
                    ],
                ),
                ("leisure", &["park", "garden", "sports_centre"]),
                ("amenity", &["university"]),
            ]),
            restricted_zones: TagFilter::new(&[("landuse", &["military"])]),
            removed: [
                (
                    "permissive",
                    TagFilter::new(&[(
                        "highway",
                        &["service", "pedestrian", "footway", "steps", "unclassified"],
                    )]),
                ),
                (
                    "restrictive",
                    TagFilter::new(&[(
                        "highway",
                        &[
                            "service",
                            "pedestrian",
                            "footway",
                            "unclassified",
                            "path",
                            "track",
                            "road",
                        ],
                    )]),
                ),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsmTagConfig {
    pub zones: ZoneConfig,
    /// Tags read on highways
    pub highway_tags: Vec<String>,
    /// Tags kept as edge attributes
    pub highway_attrs: Vec<String>,
    pub railway_tags: Vec<String>,
    pub replace_highways: BTreeMap<String, String>,
    pub replace_railways: BTreeMap<String, String>,
    pub replace_junctions: BTreeMap<String, String>,
    pub street_exclude: TagFilter,
    pub track_exclude: TagFilter,
    pub construction_exclude: TagFilter,
    pub permissive_access: TagFilter,
    pub private_access: TagFilter,
    pub walkways: ModalTagConfig,
    pub cycleways: ModalTagConfig,
    pub busways: ModalTagConfig,
    pub driveways: ModalTagConfig,
    pub railways: ModalTagConfig,
}

impl OsmTagConfig {
    pub fn modal(&self, mode: Mode) -> &ModalTagConfig {
        match mode {
            Mode::Walk => &self.walkways,
            Mode::Bike => &self.cycleways,
            Mode::Transit => &self.busways,
            Mode::Drive => &self.driveways,
            Mode::Rail => &self.railways,
        }
    }

    /// Check modal tables are attached to the right modes
    pub fn validate(&self) -> Result<(), Error> {
        for mode in Mode::ALL {
            let found = self.modal(mode).mode;
            if found != mode {
                return Err(Error::InvalidData(format!(
                    "modal tag configuration for {mode} is declared for {found}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for OsmTagConfig {
    #[allow(clippy::too_many_lines)]
    fn default() -> Self {
        let railway_tags: &[&str] = &[
            "funicular",
            "light_rail",
            "monorail",
            "narrow_gauge",
            "preserved",
            "rail",
            "subway",
            "tram",
        ];
        let cycle_infra: &[&str] = &[
            "yes",
            "lane",
            "share_busway",
            "shared",
            "shared_lane",
            "track",
            "shoulder",
        ];

        let walkways = ModalTagConfig {
            both: TagFilter::new(&[
                ("highway", &["pedestrian", "footway", "steps", "track", "path"]),
                ("sidewalk", &["both", "left", "right"]),
                ("foot", &["yes", "designated"]),
            ]),
            no: TagFilter::new(&[
                ("railway", &[]),
                ("highway", &["motorway", "trunk", "cycleway"]),
                ("sidewalk", &["no", "none"]),
                ("footway", &["no", "none", "sidewalk"]),
                ("foot", &["use_sidepath"]),
            ]),
            replace: mapping(&[
                ("both", "yes"),
                ("left", "yes"),
                ("right", "yes"),
                ("separate", "footway"),
            ]),
            ..ModalTagConfig::empty(Mode::Walk)
        };

        let cycleways = ModalTagConfig {
            map_highway: mapping(&[("cycleway", "designated")]),
            both: TagFilter::new(&[("cycleway:both", cycle_infra), ("oneway:bicycle", &["no"])]),
            oneway: TagFilter::new(&[
                ("bicycle", &["yes", "designated"]),
                ("cycleway", cycle_infra),
                (
                    "cycleway:lane",
                    &[
                        "yes",
                        "lane",
                        "share_busway",
                        "shared",
                        "track",
                        "exclusive",
                        "shoulder",
                    ],
                ),
                ("cyclestreet", &["yes", "designated", "permissive"]),
                ("bicycle_road", &["yes", "designated"]),
                ("oneway:bicycle", &["yes"]),
            ]),
            left: TagFilter::new(&[("cycleway:left", cycle_infra)]),
            right: TagFilter::new(&[("cycleway:right", cycle_infra)]),
            backward: TagFilter::new(&[(
                "cycleway",
                &[
                    "opposite",
                    "opposite_lane",
                    "opposite_share_busway",
                    "opposite_shared",
                    "opposite_track",
                ],
            )]),
            no: TagFilter::new(&[
                ("railway", railway_tags),
                ("highway", &["motorway", "trunk", "steps", "pedestrian", "footway"]),
                ("bicycle", &["no", "none"]),
            ]),
            yes_designated: TagFilter::new(&[("highway", &["footway"])]),
            no_infrastructure: TagFilter::new(&[
                ("cycleway", &["no", "none"]),
                ("bicycle_road", &["no", "none"]),
                ("cyclestreet", &["no", "none"]),
            ]),
            replace: mapping(&[
                ("opposite_lane", "lane"),
                ("opposite_track", "track"),
                ("opposite_share_busway", "share_busway"),
            ]),
            ..ModalTagConfig::empty(Mode::Bike)
        };

        let busways = ModalTagConfig {
            map_highway: mapping(&[("busway", "lane"), ("bus_guideway", "lane")]),
            map_service: mapping(&[("busway", "busway"), ("bus", "busway")]),
            both: TagFilter::new(&[("busway:both", &["yes", "lane"]), ("lanes:psv", &["2"])]),
            oneway: TagFilter::new(&[
                ("busway", &["yes", "lane"]),
                ("bus:lanes", &["yes"]),
                ("psv", &["yes", "bus", "designated"]),
                ("highway", &["bus_guideway", "busway"]),
            ]),
            left: TagFilter::new(&[("busway:left", &["yes", "lane"])]),
            right: TagFilter::new(&[("busway:right", &["yes", "lane"])]),
            forward: TagFilter::new(&[("bus:lanes:forward", &[]), ("lanes:psv:forward", &[])]),
            backward: TagFilter::new(&[
                ("busway", &["opposite", "opposite_lane"]),
                ("bus:lanes:backward", &[]),
                ("lanes:psv:backward", &[]),
            ]),
            no: TagFilter::new(&[
                ("highway", &["footway", "pedestrian", "cycleway", "steps", "path"]),
                ("railway", railway_tags),
                ("bus", &["no", "none"]),
            ]),
            no_infrastructure: TagFilter::new(&[
                ("busway", &["no", "none"]),
                ("bus_guideway", &["no", "none"]),
                ("psv", &["no", "none"]),
            ]),
            replace: mapping(&[
                ("bus", "busway"),
                ("yes|designated", "designated"),
                ("designated|yes", "designated"),
                ("|designated", "designated"),
                ("||designated", "designated"),
                ("|||designated", "designated"),
                ("designated|", "designated"),
                ("designated||", "designated"),
                ("designated|||", "designated"),
                ("yes|yes|designated", "designated"),
                ("designated|yes|yes", "designated"),
                ("designated|permissive", "designated"),
                ("designated|no", "designated"),
                ("no|designated", "designated"),
                ("no|no|designated", "designated"),
                ("designated|no|no", "designated"),
                ("no|yes|designated", "designated"),
                ("designated|yes|no|", "designated"),
                ("1", "lane"),
                ("2", "lane"),
            ]),
            ..ModalTagConfig::empty(Mode::Transit)
        };

        let driveways = ModalTagConfig {
            map_service: mapping(&[("alley", "alley")]),
            no: TagFilter::new(&[
                ("access", &["no", "none"]),
                ("railway", &[]),
                (
                    "highway",
                    &[
                        "bus",
                        "bus_guideway",
                        "busway",
                        "cycleway",
                        "footway",
                        "pedestrian",
                        "steps",
                        "path",
                    ],
                ),
                ("motorcar", &["no", "none"]),
                ("motor_vehicle", &["no", "none"]),
            ]),
            ..ModalTagConfig::empty(Mode::Drive)
        };

        let railways = ModalTagConfig {
            no: TagFilter::new(&[("highway", &[])]),
            ..ModalTagConfig::empty(Mode::Rail)
        };

        Self {
            zones: ZoneConfig::default(),
            highway_tags: strings(&[
                "bridge",
                "tunnel",
                "access",
                "amenity",
                "area",
                "bicycle",
                "cyclestreet",
                "bicycle_road",
                "bus",
                "busway",
                "busway:both",
                "busway:left",
                "busway:right",
                "bus:lanes",
                "bus:lanes:forward",
                "bus:lanes:backward",
                "cycleway",
                "cycleway:lane",
                "cycleway:right",
                "cycleway:left",
                "cycleway:both",
                "foot",
                "footway",
                "highway",
                "junction",
                "lanes:psv",
                "lanes:psv:forward",
                "lanes:psv:backward",
                "maxspeed",
                "motorcar",
                "motor_vehicle",
                "oneway",
                "psv",
                "service",
                "sidewalk",
                "vehicle",
            ]),
            highway_attrs: strings(&[
                "bridge",
                "lanes",
                "lit",
                "maxheight",
                "name",
                "overtaking",
                "segregated",
                "smoothness",
                "surface",
                "tunnel",
                "width",
            ]),
            railway_tags: strings(railway_tags),
            replace_highways: mapping(&[
                ("alley", "residential"),
                ("living_street", "residential"),
                ("road", "residential"),
                ("unclassified", "residential"),
            ]),
            replace_railways: mapping(&[("narrow_gauge", "rail")]),
            replace_junctions: mapping(&[
                ("circular", "roundabout"),
                ("mini_roundabout", "roundabout"),
                ("true", "link"),
            ]),
            street_exclude: TagFilter::new(&[
                (
                    "highway",
                    &[
                        "abandoned",
                        "disused",
                        "virtual",
                        "no",
                        "corridor",
                        "elevator",
                        "escalator",
                        "bus_stop",
                        "platform",
                    ],
                ),
                (
                    "service",
                    &["crossover", "yard", "spur", "siding", "irrigation", "slipway"],
                ),
                (
                    "railway",
                    &[
                        "platform",
                        "disused",
                        "abandoned",
                        "razed",
                        "subway_entrance",
                        "platform_edge",
                        "halt",
                        "turntable",
                        "depot",
                        "roundhouse",
                        "level_crossing",
                        "switch",
                        "signal",
                        "buffer_stop",
                        "crossing",
                        "station",
                        "tram_stop",
                        "workshop",
                        "technical_center",
                        "technical_station",
                        "miniature",
                    ],
                ),
                ("rail", &["subway_entrance"]),
                ("area", &["yes"]),
                ("type", &["multipolygon"]),
                ("footway", &["sidewalk", "crossing", "access_aisle"]),
            ]),
            track_exclude: TagFilter::new(&[
                ("highway", &["track", "bridleway", "via-ferrata"]),
                ("informal", &["yes"]),
                ("access", &["forestry", "agricultural"]),
                ("vehicle", &["forestry", "agricultural"]),
            ]),
            construction_exclude: TagFilter::new(&[
                ("highway", &["proposed", "construction"]),
                ("railway", &["proposed", "construction"]),
            ]),
            permissive_access: TagFilter::new(&[
                ("access", &["permissive"]),
                ("vehicle", &["permissive"]),
            ]),
            private_access: TagFilter::new(&[
                (
                    "service",
                    &[
                        "drive-through",
                        "driveway",
                        "escape",
                        "emergency_access",
                        "emergency_access_point",
                        "parking",
                        "parking_aisle",
                        "private",
                        "rest_area",
                    ],
                ),
                (
                    "highway",
                    &["emergency_access_point", "rest_area", "escape", "raceway", "services"],
                ),
                (
                    "access",
                    &[
                        "customers",
                        "delivery",
                        "military",
                        "permit",
                        "private",
                        "residents",
                        "forestry",
                        "agricultural",
                    ],
                ),
                (
                    "vehicle",
                    &[
                        "customers",
                        "delivery",
                        "military",
                        "permit",
                        "private",
                        "residents",
                        "forestry",
                        "agricultural",
                    ],
                ),
                ("motorcar", &["private", "customers"]),
                ("motor_vehicle", &["private", "customers"]),
            ]),
            walkways,
            cycleways,
            busways,
            driveways,
            railways,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn empty_values_match_any() {
        let filter = TagFilter::new(&[("railway", &[]), ("highway", &["motorway"])]);
        assert!(filter.matches(&tags(&[("railway", "tram")])));
        assert!(filter.matches(&tags(&[("highway", "motorway")])));
        assert!(!filter.matches(&tags(&[("highway", "primary")])));
    }

    #[test]
    fn last_matching_rule_wins() {
        let conf = OsmTagConfig::default();
        let way = tags(&[("highway", "footway"), ("foot", "designated")]);
        assert_eq!(conf.walkways.both.matched_value(&way), Some("designated"));

        let way = tags(&[("highway", "footway")]);
        assert_eq!(conf.walkways.both.matched_value(&way), Some("footway"));
    }

    #[test]
    fn keep_filter_merges_directional_rules() {
        let conf = OsmTagConfig::default();
        let keep = conf.busways.keep_filter();

        assert!(keep.contains("busway", "lane"));
        assert!(keep.contains("bus:lanes:forward", "anything"));
        assert!(!keep.contains("bus", "no"));
        // "busway" appears in oneway and backward rules
        assert!(keep.contains("busway", "opposite_lane"));
    }

    #[test]
    fn default_config_is_consistent() {
        let conf = OsmTagConfig::default();
        assert!(conf.validate().is_ok());
        let no_bikes = conf.cycleways.exclude_filter();
        assert!(no_bikes.contains("highway", "motorway"));
        assert!(no_bikes.contains("bicycle", "no"));
    }
}
