//! Accept loop for inbound protocol connections.
//!
//! Each accepted connection gets its own task, so a slow peer only ever
//! stalls its own handler. Handlers are capped by a semaphore; a connection
//! that arrives while every permit is taken is closed straight away, and the
//! sender sees it as "no reply".

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::select;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, warn};

use crate::dispatcher;
use crate::node::Node;

pub struct Listener {
    listener: TcpListener,
    node: Node,
    permits: Arc<Semaphore>,
}

impl Listener {
    pub fn new(listener: TcpListener, node: Node) -> Self {
        let permits = Arc::new(Semaphore::new(node.config().max_connections));
        Self {
            listener,
            node,
            permits,
        }
    }

    /// Serves connections until `shutdown` fires. In-flight handlers are
    /// aborted and the listening socket is closed on return.
    pub async fn run_until_cancelled(self, shutdown: CancellationToken) {
        let Listener {
            listener,
            node,
            permits,
        } = self;
        let mut handlers = JoinSet::new();

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    debug!("listener shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &node, &permits, &mut handlers);
                }
                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    log_handler_exit(joined);
                }
            }
        }

        permits.close();
        handlers.shutdown().await;
    }
}

fn handle_accept_result(
    result: io::Result<(TcpStream, SocketAddr)>,
    node: &Node,
    permits: &Arc<Semaphore>,
    handlers: &mut JoinSet<()>,
) {
    match result {
        Ok((stream, peer)) => spawn_handler(stream, peer, node, permits, handlers),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_handler(
    stream: TcpStream,
    peer: SocketAddr,
    node: &Node,
    permits: &Arc<Semaphore>,
    handlers: &mut JoinSet<()>,
) {
    let Ok(permit) = Arc::clone(permits).try_acquire_owned() else {
        warn!(%peer, "connection limit reached, dropping connection");
        return;
    };

    let node = node.clone();
    handlers.spawn(
        async move {
            let _permit = permit;
            if let Err(err) = dispatcher::handle_connection(stream, node).await {
                warn!(%peer, error = ?err, "connection closed with error");
            }
        }
        .in_current_span(),
    );
}

fn log_handler_exit(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        if err.is_panic() {
            warn!(error = ?err, "connection handler panicked");
        }
    }
}
