//! Graph command implementation
//!
//! One-shot mode: read a Python file, print the same JSON the API returns.

use std::path::PathBuf;

use clap::Args;

use crate::core::error::Result;
use crate::tracer::TraceConfig;
use crate::web::server::generate_graph;

/// Arguments for the graph command
#[derive(Args, Debug)]
#[command(after_help = "EXAMPLES:
    holograph graph script.py          Graph + trace as JSON
    holograph graph script.py --pretty Human-readable JSON")]
pub struct GraphArgs {
    /// Python file to analyze
    pub file: PathBuf,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

/// Run the graph command
pub async fn run(args: GraphArgs) -> Result<()> {
    let code = std::fs::read_to_string(&args.file)?;
    let response = generate_graph(&code, &TraceConfig::default()).await?;

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{rendered}");
    Ok(())
}
