//! TOML configuration of the command line

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use streetpy_core::prelude::*;
use tracing::debug;

use crate::error::CliError;

/// Settings of every command, any missing section keeps its defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub osm: OsmOptions,
    pub tags: OsmTagConfig,
    pub speeds: SpeedConfig,
    pub profile: SpeedProfile,
    pub isochrone: IsochroneOptions,
    pub conflation: ConflationConfig,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.tags.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_sections_keep_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[osm]
modes = ["walk", "bike"]
access_level = "all"
country = "fr"

[speeds.walk]
replace_maxspeed = 5.0

[isochrone]
resolution = 9
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.osm.modes, vec![Mode::Walk, Mode::Bike]);
        assert_eq!(config.osm.access_level, AccessLevel::All);
        assert!(config.osm.drive_right);
        assert_eq!(config.speeds.walk.replace_maxspeed, Some(5.0));
        assert_eq!(config.speeds.bike, SpeedConfig::default().bike);
        assert_eq!(config.isochrone.resolution, 9);
        assert_eq!(config.isochrone.sample_step, 20.0);
        assert_eq!(config.conflation, ConflationConfig::default());
    }

    #[test]
    fn no_file_gives_defaults() {
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }
}
