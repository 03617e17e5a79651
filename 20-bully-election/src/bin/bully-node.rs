//! Runs one process of a Bully election group.
//!
//! Start a 3-process group on one machine:
//! ```bash
//! cargo run --bin bully-node -- --pid 1 --port 7001 \
//!   --processes 1:127.0.0.1:7001 2:127.0.0.1:7002 3:127.0.0.1:7003
//! cargo run --bin bully-node -- --pid 2 --port 7002 \
//!   --processes 1:127.0.0.1:7001 2:127.0.0.1:7002 3:127.0.0.1:7003
//! cargo run --bin bully-node -- --pid 3 --port 7003 \
//!   --processes 1:127.0.0.1:7001 2:127.0.0.1:7002 3:127.0.0.1:7003
//! ```
//!
//! Stop process 3 with Ctrl-C and watch 2 take over.

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use bully_election::Node;
use bully_election::cli::Cli;

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Cli::parse().into_config()?;
    let pid = config.id;
    let mut handle = Node::new(config)?.start().await?;

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = ?err, "failed to install ctrl-c handler");
    }

    handle.shutdown().await;
    info!(pid, "process terminated");
    Ok(())
}
