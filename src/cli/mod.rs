//! CLI command definitions and handlers

pub mod graph;
pub mod serve;

use clap::{Parser, Subcommand};

const LONG_ABOUT: &str = r#"
Turn Python snippets into explorable 3D code graphs.

Every source line becomes a node, tagged by what it does (definition,
control flow, call, data change, ...) and positioned by a force-directed
layout. Alongside the graph, the snippet is executed in a sandboxed
interpreter to produce the trace of lines it actually touches.

QUICK START:
    1. holograph serve                 Start the API server
    2. POST /api/generate_graph        {"code": "x = 1\nprint(x)"}

ONE-SHOT:
    holograph graph script.py          Print graph + trace JSON to stdout

LOGGING:
    HOLOGRAPH_LOG=debug holograph serve
"#;

/// 3D code graph and execution trace backend
#[derive(Parser, Debug)]
#[command(name = "holograph")]
#[command(author, version)]
#[command(about = "3D code graph and execution trace backend")]
#[command(long_about = LONG_ABOUT)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    #[command(visible_alias = "s")]
    Serve(serve::ServeArgs),

    /// Generate graph + trace for a file and print JSON
    #[command(visible_alias = "g")]
    Graph(graph::GraphArgs),
}
