pub use crate::MAX_SIMPLIFY_ITER;

// Re-export key components
pub use crate::algo::conflation::{ConflationConfig, ConflationReport, conflate};
pub use crate::algo::isochrone::{Isochrone, IsochroneOptions, bulk_isochrones, calculate_isochrone};
pub use crate::algo::matching::{MatchedTrajectory, Trajectory, match_trajectories};
pub use crate::algo::simplification::{Deadend, filter_zones, simplify};
pub use crate::config::{OsmTagConfig, SpeedConfig, SpeedProfile, ZoneConfig};
pub use crate::loading::{
    AccessLevel, OsmOptions, Zone, osm_excluding_zones, read_streets, save_streets,
    streets_from_osm,
};
pub use crate::model::{Mode, ModeAccess, StreetEdge, StreetTable};
pub use crate::routing::{
    ModalStreets, ModeGraph, NodePath, Weight, paths_distance, shortest_path, shortest_paths,
    to_single_mode,
};

// Core types of street tables
pub use crate::NodeId;
pub use crate::Meters;
pub use crate::Seconds;
pub use crate::Error;
