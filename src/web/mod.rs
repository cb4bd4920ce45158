//! HTTP API
//!
//! Single-endpoint axum server: POST `/api/generate_graph` turns a snippet
//! into the positioned graph plus its execution trace.

pub mod server;

pub use server::{router, start_server};
