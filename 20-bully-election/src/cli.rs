use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use crate::config::{
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_MAX_CONNECTIONS, DEFAULT_NETWORK_TIMEOUT,
    DEFAULT_SETTLE_DELAY, NodeConfig, Timings,
};
use crate::peer::{PeerDirectory, PeerEntry, Pid};

/// Command-line arguments for one process of the group.
#[derive(Parser, Debug)]
#[command(author, version, about = "Run one process of a Bully leader-election group")]
pub struct Cli {
    /// Numeric id of this process (must appear in --processes)
    #[arg(long)]
    pub pid: Pid,

    /// Port this process listens on
    #[arg(long)]
    pub port: u16,

    /// Interface to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Every process in the group as pid:host:port, self included
    #[arg(long, required = true, num_args = 1.., value_delimiter = ',')]
    pub processes: Vec<PeerEntry>,

    /// Delay before the first election, in milliseconds
    #[arg(long, default_value_t = DEFAULT_SETTLE_DELAY.as_millis() as u64)]
    pub settle_ms: u64,

    /// Failure-detector period, in milliseconds
    #[arg(long, default_value_t = DEFAULT_HEARTBEAT_INTERVAL.as_millis() as u64)]
    pub heartbeat_ms: u64,

    /// Bound on connect and reply waits, in milliseconds
    #[arg(long, default_value_t = DEFAULT_NETWORK_TIMEOUT.as_millis() as u64)]
    pub timeout_ms: u64,

    /// Maximum number of inbound connections handled at once
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: usize,
}

impl Cli {
    pub fn into_config(self) -> Result<NodeConfig> {
        let peers = PeerDirectory::from_entries(self.processes)?;
        let config = NodeConfig::new(self.pid, SocketAddr::new(self.host, self.port), peers)
            .with_timings(Timings {
                settle_delay: Duration::from_millis(self.settle_ms),
                heartbeat_interval: Duration::from_millis(self.heartbeat_ms),
                network_timeout: Duration::from_millis(self.timeout_ms),
            })
            .with_max_connections(self.max_connections);
        config.validate()?;
        Ok(config)
    }
}
