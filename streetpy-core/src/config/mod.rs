//! Column names, OSM tag tables and speed defaults.
//!
//! Every table is a plain serde structure with a `Default` impl, so callers
//! may start from the defaults and override only what they need.

pub mod constants;
pub mod osm_tags;
pub mod speeds;

pub use osm_tags::{ModalTagConfig, OsmTagConfig, TagFilter, TagRule, ZoneConfig};
pub use speeds::{ModeSpeed, SpeedConfig, SpeedDefaults, SpeedProfile};
