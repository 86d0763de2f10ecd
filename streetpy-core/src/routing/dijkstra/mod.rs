mod regular_dijkstra;
pub(crate) mod state;
mod traced_dijkstra;

pub use regular_dijkstra::dijkstra_path_weights;
pub use traced_dijkstra::{ShortestPathTree, dijkstra_paths};
