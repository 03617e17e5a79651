//! Process composition and lifecycle.
//!
//! A [`Node`] bundles the static configuration, the guarded election state
//! and the messenger behind one `Arc`, so every task (listener, connection
//! handlers, election passes, failure detector) works on the same record.
//! [`Node::start`] spawns the background work and hands back a
//! [`NodeHandle`] for status queries and shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::select;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

use crate::config::{NodeConfig, Timings};
use crate::listener::Listener;
use crate::messenger::Messenger;
use crate::monitor;
use crate::peer::{PeerDirectory, Pid};
use crate::state::{ElectionState, Role};

/// Point-in-time view of a process's election state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub id: Pid,
    pub coordinator: Option<Pid>,
    pub in_election: bool,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

#[derive(Debug)]
struct NodeInner {
    config: NodeConfig,
    state: ElectionState,
    messenger: Messenger,
    shutdown: CancellationToken,
}

impl Node {
    pub fn new(config: NodeConfig) -> Result<Self> {
        config.validate()?;
        let messenger = Messenger::new(config.peers.clone(), config.timings.network_timeout);
        Ok(Self {
            inner: Arc::new(NodeInner {
                state: ElectionState::new(config.id),
                messenger,
                shutdown: CancellationToken::new(),
                config,
            }),
        })
    }

    pub fn id(&self) -> Pid {
        self.inner.config.id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    pub fn peers(&self) -> &PeerDirectory {
        &self.inner.config.peers
    }

    pub fn timings(&self) -> Timings {
        self.inner.config.timings
    }

    pub fn state(&self) -> &ElectionState {
        &self.inner.state
    }

    pub fn status(&self) -> Status {
        let snapshot = self.inner.state.snapshot();
        Status {
            id: self.id(),
            coordinator: snapshot.coordinator,
            in_election: snapshot.in_election,
            role: snapshot.role(self.id()),
        }
    }

    pub(crate) fn messenger(&self) -> &Messenger {
        &self.inner.messenger
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }

    /// Binds the configured listen address and starts the process.
    ///
    /// A bind failure is fatal and returned to the caller.
    pub async fn start(self) -> Result<NodeHandle> {
        let listen = self.config().listen;
        let listener = TcpListener::bind(listen)
            .await
            .with_context(|| format!("failed to bind {listen}"))?;
        self.start_on(listener)
    }

    /// Starts the process on an already-bound listener.
    ///
    /// Returns immediately. In the background the listener serves peers
    /// while a lifecycle task waits out the settle delay, runs the first
    /// election if no coordinator has been announced by then, and hands over
    /// to the failure detector.
    pub fn start_on(self, listener: TcpListener) -> Result<NodeHandle> {
        let local_addr = listener
            .local_addr()
            .context("listener has no local address")?;
        let span = info_span!("node", pid = self.id());
        span.in_scope(|| info!(%local_addr, "process started, listening"));

        let shutdown = self.shutdown_token().clone();
        let listener_task = tokio::spawn(
            Listener::new(listener, self.clone())
                .run_until_cancelled(shutdown.clone())
                .instrument(span.clone()),
        );

        let lifecycle = self.clone();
        let lifecycle_task = tokio::spawn(
            async move {
                select! {
                    _ = shutdown.cancelled() => {}
                    _ = lifecycle.run_lifecycle() => {}
                }
            }
            .instrument(span),
        );

        Ok(NodeHandle {
            node: self,
            local_addr,
            tasks: vec![listener_task, lifecycle_task],
        })
    }

    async fn run_lifecycle(&self) {
        sleep(self.timings().settle_delay).await;
        if self.state().coordinator().is_none() {
            self.start_election().await;
        }
        monitor::run(self).await;
    }
}

/// Handle to a started process.
///
/// Dropping the handle stops the process as well; [`NodeHandle::shutdown`]
/// additionally waits for the background tasks to exit.
#[derive(Debug)]
pub struct NodeHandle {
    node: Node,
    local_addr: SocketAddr,
    tasks: Vec<JoinHandle<()>>,
}

impl NodeHandle {
    pub fn id(&self) -> Pid {
        self.node.id()
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn status(&self) -> Status {
        self.node.status()
    }

    /// Stops the listener, the failure detector and any running election.
    /// In-flight connections are abandoned.
    pub async fn shutdown(&mut self) {
        self.node.shutdown_token().cancel();
        for task in self.tasks.drain(..) {
            if let Err(err) = task.await {
                if err.is_panic() {
                    warn!(pid = self.node.id(), error = ?err, "background task panicked");
                }
            }
        }
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        self.node.shutdown_token().cancel();
    }
}
