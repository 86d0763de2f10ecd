use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::config::constants::{HIGHWAY, RAILWAY, REV_SUFFIX};

/// Travel mode of a street table column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Walk,
    Bike,
    Transit,
    Drive,
    Rail,
}

impl Mode {
    pub const ALL: [Mode; 5] = [Mode::Walk, Mode::Bike, Mode::Transit, Mode::Drive, Mode::Rail];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Column name of the mode
    pub fn column(self) -> &'static str {
        match self {
            Mode::Walk => "walk",
            Mode::Bike => "bike",
            Mode::Transit => "transit",
            Mode::Drive => "drive",
            Mode::Rail => "rail",
        }
    }

    /// Reverse direction column, bidirectional modes have none
    pub fn reverse_column(self) -> Option<&'static str> {
        match self {
            Mode::Walk => None,
            Mode::Bike => Some("bike_r"),
            Mode::Transit => Some("transit_r"),
            Mode::Drive => Some("drive_r"),
            Mode::Rail => Some("rail_r"),
        }
    }

    /// Bidirectional modes can use every edge in both directions
    pub fn is_bidirectional(self) -> bool {
        matches!(self, Mode::Walk)
    }

    /// Column holding the road class of the mode
    pub fn hierarchy(self) -> &'static str {
        match self {
            Mode::Rail => RAILWAY,
            _ => HIGHWAY,
        }
    }

    /// Mode owning a column name, and whether it is the reverse column
    pub fn from_column(column: &str) -> Option<(Mode, bool)> {
        let (name, reverse) = match column.strip_suffix(REV_SUFFIX) {
            Some(name) => (name, true),
            None => (column, false),
        };
        Mode::ALL
            .into_iter()
            .find(|mode| mode.column() == name && !(reverse && mode.is_bidirectional()))
            .map(|mode| (mode, reverse))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Mode::ALL
            .into_iter()
            .find(|mode| mode.column() == lower)
            .ok_or_else(|| Error::InvalidMode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_modes() {
        assert_eq!("WALK".parse::<Mode>().unwrap(), Mode::Walk);
        assert_eq!(" rail ".parse::<Mode>().unwrap(), Mode::Rail);
        assert!(matches!("plane".parse::<Mode>(), Err(Error::InvalidMode(_))));
    }

    #[test]
    fn column_lookup() {
        assert_eq!(Mode::from_column("drive_r"), Some((Mode::Drive, true)));
        assert_eq!(Mode::from_column("walk"), Some((Mode::Walk, false)));
        assert_eq!(Mode::from_column("walk_r"), None);
        assert_eq!(Mode::Rail.hierarchy(), "railway");
    }
}
