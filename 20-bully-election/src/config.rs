//! Node configuration.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Result, ensure};

use crate::peer::{PeerDirectory, Pid};

/// Grace period between starting the listener and the first election.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(4);

/// Period of the failure detector.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Bound on every connect, write and reply wait.
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on concurrently handled inbound connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 64;

/// Protocol timing. Defaults are the group's reference values; tests shrink them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub settle_delay: Duration,
    pub heartbeat_interval: Duration,
    pub network_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            network_timeout: DEFAULT_NETWORK_TIMEOUT,
        }
    }
}

/// Everything a process needs to join the group.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// This process's id (must appear in `peers`)
    pub id: Pid,
    /// Address to bind for inbound protocol connections
    pub listen: SocketAddr,
    /// Every process in the group, self included
    pub peers: PeerDirectory,
    pub timings: Timings,
    pub max_connections: usize,
}

impl NodeConfig {
    pub fn new(id: Pid, listen: SocketAddr, peers: PeerDirectory) -> Self {
        Self {
            id,
            listen,
            peers,
            timings: Timings::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.id > 0, "process id must be a positive integer");
        ensure!(
            self.peers.contains(self.id),
            "process id {} missing from the peer table",
            self.id
        );
        ensure!(
            self.max_connections > 0,
            "max connections must be at least 1"
        );
        ensure!(
            !self.timings.network_timeout.is_zero(),
            "network timeout must be non-zero"
        );
        ensure!(
            !self.timings.heartbeat_interval.is_zero(),
            "heartbeat interval must be non-zero"
        );
        Ok(())
    }
}
