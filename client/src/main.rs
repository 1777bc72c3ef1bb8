//! textsync client binary.
//!
//! Walks the local tree, launches the server over SSH, reconciles the two
//! sides, then watches the local tree and pushes character-level deltas as
//! it changes.

mod reconciler;
mod rpc;
mod transport;
mod watcher;

use std::path::PathBuf;

use clap::Parser;
use textsync_core::{walk, IgnorePolicy};
use tracing::info;

use reconciler::Reconciler;
use rpc::RpcClient;
use transport::{RemoteTarget, Transport};
use watcher::ClientWatcher;

#[derive(Parser, Debug)]
#[command(name = "textsync-client", about = "watch a local tree and keep a remote tree converged", long_about = None)]
struct Cli {
    /// Remote host, e.g. `example.com`.
    #[arg(long)]
    addr: String,

    /// Directory on the remote host to serve.
    #[arg(long)]
    remote: String,

    /// Local directory to watch.
    #[arg(long)]
    local: PathBuf,

    /// Remote SSH user, if not the current user.
    #[arg(long)]
    user: Option<String>,

    /// Remote SSH port, if not 22.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
    let cli = Cli::parse();

    let ignore = IgnorePolicy::default();
    let mut cache = walk::walk_tracked(&cli.local, &ignore)?;
    info!(count = cache.len(), local = %cli.local.display(), "walked local tree");

    let target = RemoteTarget {
        host: cli.addr.clone(),
        user: cli.user.clone(),
        port: cli.port,
        remote_dir: cli.remote.clone(),
    };
    let transport = Transport::connect(&target)?;
    let (reader, writer) = transport.into_split();
    let mut rpc = RpcClient::new(reader, writer);

    Reconciler::auto_resolve(&cli.local, &mut cache, &mut rpc).await?;
    info!("reconciled with {}", cli.addr);

    let watcher = ClientWatcher::new(cli.local, ignore, cache, rpc);
    watcher.run().await?;
    Ok(())
}
