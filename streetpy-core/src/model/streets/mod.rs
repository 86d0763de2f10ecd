//! Multimodal street table model

pub mod components;
pub mod network;
pub mod table;

pub use components::{ModeAccess, StreetEdge};
pub use network::{
    connected_components, degree, filter_by_component, has_any_nodes, is_loop, node_coordinates,
};
pub use table::{
    StreetTable, is_accessible, is_designated, is_valid_street, street_columns,
    street_mode_columns,
};
