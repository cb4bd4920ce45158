//! Serve command implementation

use clap::Args;

use crate::core::error::Result;

/// Arguments for the serve command
#[derive(Args, Debug)]
#[command(after_help = "EXAMPLES:
    holograph serve                    Serve on 127.0.0.1:5000
    holograph serve --port 8080        Use custom port
    holograph serve --host 0.0.0.0     Listen on all interfaces")]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to serve on
    #[arg(long, default_value = "5000")]
    pub port: u16,
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    crate::web::start_server(&args.host, args.port).await
}
