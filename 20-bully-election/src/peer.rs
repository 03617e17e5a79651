//! Static peer directory.
//!
//! Every process in the group knows the id and address of every other process
//! up front. The directory is built once at startup and never changes; it is
//! cheap to clone because the table sits behind an `Arc`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Bound;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail, ensure};

/// Process identity. Higher ids take precedence in an election.
pub type Pid = u64;

/// Network location of a peer's listener.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerAddr {
    pub host: String,
    pub port: u16,
}

impl PeerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One `pid:host:port` entry as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEntry {
    pub id: Pid,
    pub addr: PeerAddr,
}

impl FromStr for PeerEntry {
    type Err = anyhow::Error;

    fn from_str(entry: &str) -> Result<Self> {
        let entry = entry.trim();
        let Some((id_str, rest)) = entry.split_once(':') else {
            bail!("invalid peer entry '{entry}', expected pid:host:port");
        };
        // Split the port off the right so bracketed IPv6 hosts keep their colons.
        let Some((host, port_str)) = rest.rsplit_once(':') else {
            bail!("invalid peer entry '{entry}', expected pid:host:port");
        };
        let id: Pid = id_str
            .parse()
            .with_context(|| format!("invalid peer id in '{entry}'"))?;
        let port: u16 = port_str
            .parse()
            .with_context(|| format!("invalid peer port in '{entry}'"))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        ensure!(!host.is_empty(), "missing host in peer entry '{entry}'");

        Ok(Self {
            id,
            addr: PeerAddr::new(host, port),
        })
    }
}

/// Immutable `pid -> address` table for the whole group, self included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDirectory {
    peers: Arc<BTreeMap<Pid, PeerAddr>>,
}

impl PeerDirectory {
    pub fn new(peers: BTreeMap<Pid, PeerAddr>) -> Result<Self> {
        ensure!(!peers.is_empty(), "peer directory requires at least one process");
        ensure!(
            !peers.contains_key(&0),
            "process ids must be positive integers"
        );
        Ok(Self {
            peers: Arc::new(peers),
        })
    }

    /// Builds the directory from parsed entries, rejecting duplicate ids.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = PeerEntry>,
    {
        let mut peers = BTreeMap::new();
        for PeerEntry { id, addr } in entries {
            if let Some(previous) = peers.insert(id, addr) {
                return Err(anyhow!(
                    "process id {id} listed more than once (first at {previous})"
                ));
            }
        }
        Self::new(peers)
    }

    pub fn address_of(&self, pid: Pid) -> Option<&PeerAddr> {
        self.peers.get(&pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.peers.contains_key(&pid)
    }

    pub fn all_ids(&self) -> BTreeSet<Pid> {
        self.peers.keys().copied().collect()
    }

    /// Ids strictly greater than `than`, ascending.
    pub fn higher_ids(&self, than: Pid) -> Vec<Pid> {
        self.peers
            .range((Bound::Excluded(than), Bound::Unbounded))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Every id except `me`, ascending.
    pub fn others(&self, me: Pid) -> Vec<Pid> {
        self.peers.keys().copied().filter(|id| *id != me).collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
