//! Line-level code graph construction
//!
//! The graph model (`types`), the node-kind categorizer (`category`) and the
//! two-pass builder (`builder`).

pub mod builder;
pub mod category;
pub mod types;

pub use builder::build;
pub use types::{Category, CodeGraph, Edge, GraphNode};
