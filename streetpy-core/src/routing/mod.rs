//! Single mode graphs and path searches

pub mod dijkstra;
pub mod graph;
pub mod shortest_path;
pub mod single_mode;

pub use graph::{EdgeCandidate, GraphEdge, GraphNode, ModeGraph, StreetGraph, Weight};
pub use shortest_path::{NodePath, paths_distance, shortest_path, shortest_paths};
pub use single_mode::{ModalEdge, ModalStreets, to_single_mode};
