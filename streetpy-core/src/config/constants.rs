//! Column names shared by every street table

use crate::Mode;

/// Suffix of reverse direction mode columns
pub const REV_SUFFIX: &str = "_r";

/// Max speed column, km/h
pub const SPEED: &str = "maxspeed";
pub const URBAN: &str = "urban";
/// Hierarchy columns
pub const HIGHWAY: &str = "highway";
pub const RAILWAY: &str = "railway";
pub const JUNCTION: &str = "junction";

pub const SOURCE: &str = "source";
pub const TARGET: &str = "target";
pub const OSMID: &str = "osmid";
pub const GEOMETRY: &str = "geometry";
pub const EDGE: &str = "edge";

/// Multiplier converting a unit found in OSM max speeds to km/h
pub fn unit_conversion(unit: &str) -> Option<f64> {
    match unit {
        "MPH" | "mph" => Some(1.60934),
        "km/h" | "kmh" | "kph" => Some(1.0),
        _ => None,
    }
}

pub fn base_columns() -> [&'static str; 2] {
    [SPEED, HIGHWAY]
}

/// Columns written only when some edge has a value
pub fn optional_columns() -> [&'static str; 2] {
    [URBAN, JUNCTION]
}

/// All mode columns: forward columns first, then reverse columns of the
/// modes that have one
pub fn mode_columns() -> Vec<&'static str> {
    Mode::ALL
        .iter()
        .map(|mode| mode.column())
        .chain(Mode::ALL.iter().filter_map(|mode| mode.reverse_column()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_columns_order() {
        assert_eq!(
            mode_columns(),
            vec![
                "walk",
                "bike",
                "transit",
                "drive",
                "rail",
                "bike_r",
                "transit_r",
                "drive_r",
                "rail_r"
            ]
        );
    }

    #[test]
    fn units() {
        assert_eq!(unit_conversion("mph"), Some(1.60934));
        assert_eq!(unit_conversion("knots"), None);
    }
}
