//! Inbound request handling.
//!
//! One call per accepted connection: read a single request, react to it, and
//! return. The stream is owned here, so it is closed on every exit path.

use anyhow::{Context, Result};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::message::{Message, read_message, write_message};
use crate::node::Node;
use crate::peer::Pid;

pub async fn handle_connection(mut stream: TcpStream, node: Node) -> Result<()> {
    let limit = node.timings().network_timeout;
    let request = timeout(limit, read_message(&mut stream))
        .await
        .context("timed out waiting for request")?
        .context("failed to read request")?;

    let Some(request) = request else {
        debug!("peer closed the connection before sending a request");
        return Ok(());
    };

    match request {
        Message::Election { sender } => handle_election(&mut stream, &node, sender).await,
        Message::Coordinator {
            coordinator,
            sender,
        } => {
            debug!(coordinator, ?sender, "received COORDENADOR");
            node.adopt_coordinator(coordinator);
            Ok(())
        }
        Message::Heartbeat { sender } => {
            debug!(peer = sender, "received HEARTBEAT");
            reply(&mut stream, &node, &Message::HeartbeatAck).await
        }
        Message::Answer { .. } | Message::HeartbeatAck | Message::Ack => {
            debug!(?request, "ignoring unsolicited reply");
            Ok(())
        }
    }
}

async fn handle_election(stream: &mut TcpStream, node: &Node, sender: Pid) -> Result<()> {
    if node.state().is_coordinator() {
        info!(peer = sender, "already coordinator, rejecting election");
        return reply(stream, node, &Message::announcement(node.id())).await;
    }

    info!(peer = sender, "received ELECTION");
    let replied = reply(stream, node, &Message::Answer { sender: node.id() }).await;
    node.spawn_election();
    replied
}

async fn reply(stream: &mut TcpStream, node: &Node, message: &Message) -> Result<()> {
    timeout(node.timings().network_timeout, write_message(stream, message))
        .await
        .context("timed out writing reply")?
        .context("failed to write reply")
}
