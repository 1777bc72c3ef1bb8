//! textsync server binary.
//!
//! Launched by the client over the transport with its working directory
//! already set to the tree to serve. Takes no flags: requests are decoded
//! from standard input, responses are encoded to standard output, and
//! diagnostics go to standard error so they never pollute the wire.

mod engine;

use clap::Parser;
use engine::ServerEngine;
use textsync_core::{framing, IgnorePolicy};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "textsync-server", about = "textsync server loop over stdio", long_about = None)]
struct Cli {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
    let Cli {} = Cli::parse();

    let root = std::env::current_dir()?;
    let mut engine = ServerEngine::new(root.clone(), IgnorePolicy::default())?;
    info!(root = %root.display(), "textsync server ready");

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    loop {
        let request = match framing::read_message(&mut stdin).await {
            Ok(Some(req)) => req,
            Ok(None) => {
                info!("transport closed, shutting down");
                break;
            }
            Err(e) => {
                warn!(error = %e, "protocol error reading request, shutting down");
                break;
            }
        };
        let response = engine.handle(request);
        if let Err(e) = framing::write_message(&mut stdout, &response).await {
            warn!(error = %e, "failed to write response, shutting down");
            break;
        }
    }
    Ok(())
}
