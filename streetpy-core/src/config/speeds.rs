//! Max speed defaults and per mode speed configuration. All values in km/h.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Mode;

/// Car max speed defaults used when OSM has no `maxspeed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedDefaults {
    pub urban: f64,
    pub highway: BTreeMap<String, f64>,
    #[serde(rename = "else")]
    pub other: f64,
}

impl Default for SpeedDefaults {
    fn default() -> Self {
        Self {
            urban: 50.0,
            highway: [("living_street", 20.0), ("trunk", 110.0), ("motorway", 130.0)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            other: 90.0,
        }
    }
}

/// Speed used to estimate travel times for a mode
///
/// `replace_maxspeed` overrides the street max speed, `default` fills
/// missing max speeds and `max` caps them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeSpeed {
    pub replace_maxspeed: Option<f64>,
    pub default: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    pub car: SpeedDefaults,
    /// Country code -> overridden keys, `urban` and `else` are top level
    /// defaults, any other key is a highway value
    pub country_modifiers: BTreeMap<String, BTreeMap<String, f64>>,
    pub walk: ModeSpeed,
    pub bike: ModeSpeed,
    pub transit: ModeSpeed,
    pub drive: ModeSpeed,
    pub rail: ModeSpeed,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        let miles = 70.0 * 1609.0 / 1000.0;
        let modifiers: &[(&str, &[(&str, f64)])] = &[
            ("at", &[("else", 100.0), ("trunk", 100.0)]),
            ("be", &[("motorway", 120.0), ("rural", 70.0), ("urban", 30.0)]),
            ("by", &[("urban", 60.0), ("motorway", 110.0)]),
            ("ch", &[("else", 80.0), ("trunk", 110.0), ("motorway", 120.0)]),
            ("de", &[("living_street", 7.0), ("else", 100.0)]),
            ("dk", &[("else", 80.0)]),
            ("fr", &[("else", 80.0)]),
            ("gb", &[("motorway", miles)]),
            ("nl", &[("else", 80.0), ("trunk", 100.0)]),
            ("no", &[("else", 80.0), ("motorway", 110.0)]),
            ("pl", &[("else", 100.0), ("trunk", 120.0), ("motorway", 140.0)]),
            ("ro", &[("trunk", 100.0)]),
            ("ru", &[("else", 60.0), ("motorway", 110.0)]),
            ("uk", &[("motorway", miles)]),
            ("za", &[("urban", 60.0), ("else", 100.0)]),
        ];

        Self {
            car: SpeedDefaults::default(),
            country_modifiers: modifiers
                .iter()
                .map(|(country, values)| {
                    (
                        (*country).to_string(),
                        values.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
                    )
                })
                .collect(),
            walk: ModeSpeed {
                replace_maxspeed: Some(4.0),
                ..ModeSpeed::default()
            },
            bike: ModeSpeed {
                replace_maxspeed: Some(16.0),
                ..ModeSpeed::default()
            },
            transit: ModeSpeed {
                replace_maxspeed: None,
                default: Some(50.0),
                max: Some(80.0),
            },
            drive: ModeSpeed {
                default: Some(50.0),
                ..ModeSpeed::default()
            },
            rail: ModeSpeed {
                default: Some(50.0),
                ..ModeSpeed::default()
            },
        }
    }
}

impl SpeedConfig {
    pub fn mode(&self, mode: Mode) -> &ModeSpeed {
        match mode {
            Mode::Walk => &self.walk,
            Mode::Bike => &self.bike,
            Mode::Transit => &self.transit,
            Mode::Drive => &self.drive,
            Mode::Rail => &self.rail,
        }
    }

    /// Car defaults with the country modifier applied, if the country is known
    pub fn speed_defaults(&self, country: Option<&str>) -> SpeedDefaults {
        let mut res = self.car.clone();
        let Some(modifier) = country.and_then(|c| self.country_modifiers.get(&c.to_lowercase()))
        else {
            return res;
        };

        for (key, value) in modifier {
            match key.as_str() {
                "urban" => res.urban = *value,
                "else" => res.other = *value,
                _ => {
                    res.highway.insert(key.clone(), *value);
                }
            }
        }
        res
    }
}

/// Time of day congestion profile
///
/// `hierarchy_ratios` gives the peak hour speed ratio of a hierarchy value
/// (e.g. `primary = 0.6`), hierarchy values not listed are not congested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedProfile {
    /// Lowest allowed peak ratio
    pub max_slow: f64,
    /// Midday ratio when the peak ratio is 1
    pub midday_min: f64,
    /// Midday ratio when the peak ratio is 0
    pub midday_max: f64,
    pub hierarchy_ratios: BTreeMap<String, f64>,
}

impl Default for SpeedProfile {
    fn default() -> Self {
        Self {
            max_slow: 0.4,
            midday_min: 0.9,
            midday_max: 0.5,
            hierarchy_ratios: BTreeMap::new(),
        }
    }
}
