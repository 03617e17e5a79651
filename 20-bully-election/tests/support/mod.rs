//! Shared harness for integration tests: real nodes on loopback ports, and
//! scripted peers that answer protocol requests however a test needs.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use bully_election::message::{read_message, write_message};
use bully_election::{Message, Node, NodeConfig, NodeHandle, PeerAddr, PeerDirectory, Pid, Timings};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accelerated protocol timing for tests.
pub fn fast_timings() -> Timings {
    Timings {
        settle_delay: Duration::from_millis(150),
        heartbeat_interval: Duration::from_millis(250),
        network_timeout: Duration::from_millis(200),
    }
}

/// Timing that keeps the lifecycle task out of the way of a test driving the
/// node by hand.
pub fn manual_timings() -> Timings {
    Timings {
        settle_delay: Duration::from_secs(600),
        heartbeat_interval: Duration::from_secs(600),
        network_timeout: Duration::from_millis(500),
    }
}

pub async fn bind_loopback() -> Result<(TcpListener, PeerAddr)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    Ok((listener, PeerAddr::new("127.0.0.1", port)))
}

/// An address nothing listens on; connecting to it is refused.
pub async fn closed_port() -> Result<PeerAddr> {
    let (listener, addr) = bind_loopback().await?;
    drop(listener);
    Ok(addr)
}

/// Polls `condition` until it holds or `timeout` passes.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    loop {
        if condition() {
            return true;
        }
        if start.elapsed() > timeout {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

type Script = dyn Fn(&Message) -> Option<Message> + Send + Sync;

/// A fake group member that records every request and replies per `script`.
pub struct ScriptedPeer {
    pub addr: PeerAddr,
    received: Arc<Mutex<Vec<Message>>>,
    task: JoinHandle<()>,
}

impl ScriptedPeer {
    pub async fn spawn<F>(script: F) -> Result<Self>
    where
        F: Fn(&Message) -> Option<Message> + Send + Sync + 'static,
    {
        Self::spawn_with_delay(Duration::ZERO, script).await
    }

    /// Like [`ScriptedPeer::spawn`], but waits `delay` before each reply.
    pub async fn spawn_with_delay<F>(delay: Duration, script: F) -> Result<Self>
    where
        F: Fn(&Message) -> Option<Message> + Send + Sync + 'static,
    {
        let (listener, addr) = bind_loopback().await?;
        let received = Arc::new(Mutex::new(Vec::new()));
        let script: Arc<Script> = Arc::new(script);

        let log = Arc::clone(&received);
        let task = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                let script = Arc::clone(&script);
                tokio::spawn(async move {
                    let Ok(Some(request)) = read_message(&mut stream).await else {
                        return;
                    };
                    log.lock().unwrap().push(request);
                    if let Some(reply) = script(&request) {
                        tokio::time::sleep(delay).await;
                        let _ = write_message(&mut stream, &reply).await;
                    }
                });
            }
        });

        Ok(Self {
            addr,
            received,
            task,
        })
    }

    /// A peer that never replies.
    pub async fn silent() -> Result<Self> {
        Self::spawn(|_| None).await
    }

    pub fn received(&self) -> Vec<Message> {
        self.received.lock().unwrap().clone()
    }

    pub fn count(&self, wanted: &Message) -> usize {
        self.received().iter().filter(|m| *m == wanted).count()
    }
}

impl Drop for ScriptedPeer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Builds a node that is not started: its own directory entry points at a
/// closed port, and `others` supply the rest of the table.
pub async fn standalone_node(id: Pid, others: &[(Pid, PeerAddr)], timings: Timings) -> Result<Node> {
    let mut table: BTreeMap<Pid, PeerAddr> = others.iter().cloned().collect();
    let own = closed_port().await?;
    table.insert(id, own.clone());
    let listen = format!("{own}").parse()?;
    let config = NodeConfig::new(id, listen, PeerDirectory::new(table)?).with_timings(timings);
    Node::new(config)
}

/// Starts one node on a fresh loopback port with scripted peers around it.
pub async fn started_node(
    id: Pid,
    others: &[(Pid, PeerAddr)],
    timings: Timings,
    max_connections: usize,
) -> Result<NodeHandle> {
    let (listener, addr) = bind_loopback().await?;
    let mut table: BTreeMap<Pid, PeerAddr> = others.iter().cloned().collect();
    table.insert(id, addr);
    let config = NodeConfig::new(id, listener.local_addr()?, PeerDirectory::new(table)?)
        .with_timings(timings)
        .with_max_connections(max_connections);
    Node::new(config)?.start_on(listener)
}

/// A group of real nodes talking over loopback TCP.
pub struct TestCluster {
    peers: PeerDirectory,
    timings: Timings,
    handles: BTreeMap<Pid, NodeHandle>,
}

impl TestCluster {
    /// Starts one node per id, all at once.
    pub async fn spawn(ids: &[Pid], timings: Timings) -> Result<Self> {
        let mut listeners = Vec::new();
        let mut table = BTreeMap::new();
        for id in ids {
            let (listener, addr) = bind_loopback().await?;
            table.insert(*id, addr);
            listeners.push((*id, listener));
        }
        let peers = PeerDirectory::new(table)?;

        let mut handles = BTreeMap::new();
        for (id, listener) in listeners {
            let config = NodeConfig::new(id, listener.local_addr()?, peers.clone())
                .with_timings(timings);
            handles.insert(id, Node::new(config)?.start_on(listener)?);
        }

        Ok(Self {
            peers,
            timings,
            handles,
        })
    }

    pub fn node(&self, id: Pid) -> &NodeHandle {
        &self.handles[&id]
    }

    pub fn live_ids(&self) -> Vec<Pid> {
        self.handles.keys().copied().collect()
    }

    /// Simulates a crash: the process stops listening and stops all work.
    pub async fn stop(&mut self, id: Pid) {
        if let Some(mut handle) = self.handles.remove(&id) {
            handle.shutdown().await;
        }
    }

    /// Starts a fresh process (no known coordinator) on `id`'s original address.
    pub async fn restart(&mut self, id: Pid) -> Result<()> {
        let Some(addr) = self.peers.address_of(id) else {
            bail!("process {id} is not part of the group");
        };
        let listener = TcpListener::bind((addr.host.as_str(), addr.port)).await?;
        let config = NodeConfig::new(id, listener.local_addr()?, self.peers.clone())
            .with_timings(self.timings);
        self.handles
            .insert(id, Node::new(config)?.start_on(listener)?);
        Ok(())
    }

    /// Waits until every live process reports `expected` as coordinator.
    pub async fn wait_for_consensus(&self, expected: Pid, timeout: Duration) -> Result<()> {
        let agreed = wait_until(timeout, || {
            self.handles
                .values()
                .all(|handle| handle.status().coordinator == Some(expected))
        })
        .await;
        if !agreed {
            let seen: Vec<_> = self
                .handles
                .values()
                .map(|handle| (handle.id(), handle.status().coordinator))
                .collect();
            bail!("timeout waiting for consensus on {expected}, saw {seen:?}");
        }
        Ok(())
    }

    pub async fn shutdown(mut self) {
        for (_, mut handle) in std::mem::take(&mut self.handles) {
            handle.shutdown().await;
        }
    }
}
