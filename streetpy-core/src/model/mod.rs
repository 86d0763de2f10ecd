//! Data model of street tables
//!
//! Contains travel modes, street edges and the multimodal street table.

pub mod modes;
pub mod streets;

pub use modes::Mode;
pub use streets::{ModeAccess, StreetEdge, StreetTable};
