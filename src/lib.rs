//! Holograph - 3D code graph and execution trace backend
//!
//! Parses a Python snippet into a line-level graph (nodes tagged by semantic
//! category, edges following control-flow adjacency), lays it out in 3D, and
//! runs the snippet under a bounded interpreter to capture which lines
//! actually execute.

pub mod cli;
pub mod core;
pub mod graph;
pub mod layout;
pub mod source;
pub mod tracer;
pub mod web;

pub use crate::core::error::{Error, Result};
