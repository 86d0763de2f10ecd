//! OSM PBF processing

mod modal;
mod processor;
pub mod reader;
mod zones;

use std::path::Path;

use log::info;

pub use processor::process_ways;
pub use reader::{OsmData, OsmRelation, OsmWay, read_areas, read_ways};
pub use zones::{PERMISSIVE, RESTRICTIVE, Zone, osm_excluding_zones, zones_from_areas};

use crate::config::{OsmTagConfig, SpeedConfig};
use crate::loading::OsmOptions;
use crate::{Error, StreetTable};

/// Undirected multimodal street table from an OSM PBF file, without self
/// loops
///
/// # Errors
///
/// Returns an error if the options are invalid or the file cannot be read
pub fn streets_from_osm<P: AsRef<Path>>(
    path: P,
    options: &OsmOptions,
    conf: &OsmTagConfig,
    speeds: &SpeedConfig,
) -> Result<StreetTable, Error> {
    options.validate()?;
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::InvalidData(format!(
            "OSM file not found: {}",
            path.display()
        )));
    }
    info!("Processing street data (OSM): {}", path.display());

    let data = read_ways(path, |tags| {
        processor::is_street(tags, options) && processor::is_kept(tags, options, conf)
    })?;
    let table = process_ways(&data, options, conf, speeds)?;
    drop(data);

    // Decoding allocates a lot of small buffers that glibc does not hand
    // back to the system on its own.
    //
    // # Safety
    //
    // Only compiled for linux with the glibc implementation.
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    unsafe {
        if libc::malloc_trim(0) == 0 {
            log::warn!("Memory trimming failed - continuing anyway");
        } else {
            log::debug!("Successfully trimmed unused heap memory");
        }
    }
    Ok(table)
}
