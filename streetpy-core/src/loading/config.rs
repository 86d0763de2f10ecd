use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Mode};

/// Private and permissive access filtering of streets and zones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Keep every street
    All,
    /// Drop private streets
    Permissive,
    /// Drop private and permissive streets
    #[default]
    Public,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessLevel::All => f.write_str("all"),
            AccessLevel::Permissive => f.write_str("permissive"),
            AccessLevel::Public => f.write_str("public"),
        }
    }
}

impl FromStr for AccessLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(AccessLevel::All),
            "permissive" => Ok(AccessLevel::Permissive),
            "public" => Ok(AccessLevel::Public),
            other => Err(Error::InvalidData(format!(
                "access level must be all, permissive or public, got {other}"
            ))),
        }
    }
}

/// Options of street extraction from OSM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsmOptions {
    pub modes: Vec<Mode>,
    pub access_level: AccessLevel,
    /// Keep tracks and non urban streets
    pub track: bool,
    /// Keep proposed and under construction streets
    pub construction: bool,
    pub drive_right: bool,
    /// Country code of max speed defaults
    pub country: Option<String>,
}

impl Default for OsmOptions {
    fn default() -> Self {
        Self {
            modes: Mode::ALL.to_vec(),
            access_level: AccessLevel::Public,
            track: false,
            construction: false,
            drive_right: true,
            country: None,
        }
    }
}

impl OsmOptions {
    pub fn has_mode(&self, mode: Mode) -> bool {
        self.modes.contains(&mode)
    }

    /// Rail is the single requested mode
    pub fn rail_only(&self) -> bool {
        self.modes == [Mode::Rail]
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.modes.is_empty() {
            return Err(Error::InvalidMode("no mode requested".to_string()));
        }
        Ok(())
    }
}
