//! Loading and saving street tables: OSM PBF extraction, GeoJSON and CSV
//! files.

mod config;
pub mod io;
pub mod osm;

pub use config::{AccessLevel, OsmOptions};
pub use io::{read_streets, save_streets};
pub use osm::{Zone, osm_excluding_zones, streets_from_osm};
