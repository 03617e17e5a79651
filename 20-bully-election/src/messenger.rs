//! Outbound request/reply over a fresh connection per call.
//!
//! A send is a single bounded attempt. Every failure (unknown id, refused
//! connection, timeout, reset, empty or malformed reply) comes back as `None`,
//! which callers read as "that peer is dead for this round". Retrying is the
//! caller's decision.

use std::io;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::message::{Message, read_message, write_message};
use crate::peer::{PeerAddr, PeerDirectory, Pid};

#[derive(Debug, Clone)]
pub struct Messenger {
    peers: PeerDirectory,
    timeout: Duration,
}

impl Messenger {
    pub fn new(peers: PeerDirectory, timeout: Duration) -> Self {
        Self { peers, timeout }
    }

    /// Sends `message` to `to` and waits for its reply.
    ///
    /// Announcements are one-way: the reply is not awaited and the result is
    /// always [`Message::Ack`], whatever happened on the network.
    pub async fn send(&self, to: Pid, message: &Message) -> Option<Message> {
        let Some(addr) = self.peers.address_of(to) else {
            warn!(peer = to, "no address for peer, dropping message");
            return if message.expects_reply() {
                None
            } else {
                Some(Message::Ack)
            };
        };

        let result = self.exchange(addr, message).await;
        if !message.expects_reply() {
            if let Err(err) = result {
                debug!(peer = to, %addr, error = %err, "announcement not delivered");
            }
            return Some(Message::Ack);
        }

        match result {
            Ok(Some(reply)) => Some(reply),
            Ok(None) => {
                debug!(peer = to, %addr, "peer closed the connection without replying");
                None
            }
            Err(err) => {
                debug!(peer = to, %addr, error = %err, "peer unreachable");
                None
            }
        }
    }

    async fn exchange(&self, addr: &PeerAddr, message: &Message) -> io::Result<Option<Message>> {
        let mut stream = timeout(
            self.timeout,
            TcpStream::connect((addr.host.as_str(), addr.port)),
        )
        .await
        .map_err(|_| timed_out("connect"))??;

        timeout(self.timeout, write_message(&mut stream, message))
            .await
            .map_err(|_| timed_out("write"))??;

        if !message.expects_reply() {
            return Ok(Some(Message::Ack));
        }

        timeout(self.timeout, read_message(&mut stream))
            .await
            .map_err(|_| timed_out("reply"))?
    }
}

fn timed_out(phase: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, format!("timed out waiting for {phase}"))
}
