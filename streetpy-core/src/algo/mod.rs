//! Street network algorithms

pub mod attributes;
pub mod conflation;
pub mod isochrone;
pub mod matching;
pub mod simplification;

pub use attributes::{
    base_travel_time, congested_travel_time, convert_unit, default_maxspeed, time_ratio, urban,
};
pub use conflation::{ConflationConfig, ConflationReport, EdgeMatch, conflate};
pub use isochrone::{Isochrone, IsochroneOptions, ReachedEdge, bulk_isochrones, calculate_isochrone};
pub use matching::{MatchedEdge, MatchedTrajectory, Trajectory, match_trajectories};
pub use simplification::{AccessZone, Deadend, filter_zones, simplify};
