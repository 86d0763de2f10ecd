//! Multimodal street network analysis.
//!
//! Street networks are held as tabular collections of edges ([`StreetTable`]),
//! where every edge carries a forward/backward accessibility value per travel
//! mode. From there the crate builds mode specific directed graphs, computes
//! shortest paths and isochrones, infers attributes such as default speeds and
//! conflates attributes coming from other street sources.

pub mod algo;
pub mod config;
mod error;
pub mod loading;
pub mod model;
pub mod prelude;
pub mod routing;
pub mod spatial;

pub use error::Error;
pub use model::{Mode, ModeAccess, StreetEdge, StreetTable};
pub use routing::{ModalStreets, ModeGraph};

/// Node identifier, usually an OSM node id
pub type NodeId = i64;
/// Travel time in seconds
pub type Seconds = f64;
/// Length in meters
pub type Meters = f64;

/// Maximum number of simplification rounds
pub const MAX_SIMPLIFY_ITER: usize = 100;
