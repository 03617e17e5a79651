//! Wire protocol.
//!
//! Each connection carries exactly one JSON object per direction: the request
//! is written in a single write, and the reply (if any) is read back with one
//! bounded receive of at most [`MAX_MESSAGE_SIZE`] bytes. There is no other
//! framing. Field and kind names match the group's existing wire format.

use std::io;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::peer::Pid;

/// Upper bound on an encoded payload, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tipo")]
pub enum Message {
    /// Challenge sent to every higher id when an election starts.
    #[serde(rename = "ELEICAO", alias = "ELECTION")]
    Election {
        #[serde(rename = "remetente_pid")]
        sender: Pid,
    },
    /// "I am alive and outrank you"; reply to [`Message::Election`].
    #[serde(rename = "RESPOSTA", alias = "ANSWER")]
    Answer {
        #[serde(rename = "remetente_pid")]
        sender: Pid,
    },
    /// Announcement of a coordinator, or an incumbent's rejection of a challenge.
    #[serde(rename = "COORDENADOR", alias = "COORDINATOR")]
    Coordinator {
        #[serde(rename = "coordenador_pid")]
        coordinator: Pid,
        #[serde(
            rename = "remetente_pid",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        sender: Option<Pid>,
    },
    #[serde(rename = "HEARTBEAT")]
    Heartbeat {
        #[serde(rename = "remetente_pid")]
        sender: Pid,
    },
    #[serde(rename = "HEARTBEAT_ACK")]
    HeartbeatAck,
    /// Synthesized locally for one-way sends; never expected from a peer.
    #[serde(rename = "ACK")]
    Ack,
}

impl Message {
    /// Announcement sent by a freshly elected coordinator.
    pub fn announcement(coordinator: Pid) -> Self {
        Message::Coordinator {
            coordinator,
            sender: Some(coordinator),
        }
    }

    /// One-way messages are written and the connection dropped without a read.
    pub fn expects_reply(&self) -> bool {
        !matches!(self, Message::Coordinator { .. })
    }

    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let encoded = serde_json::to_vec(self).map_err(to_io_error)?;
        if encoded.len() > MAX_MESSAGE_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "encoded message is {} bytes, limit is {MAX_MESSAGE_SIZE}",
                    encoded.len()
                ),
            ));
        }
        Ok(encoded)
    }

    pub fn decode(bytes: &[u8]) -> io::Result<Self> {
        serde_json::from_slice(bytes).map_err(to_io_error)
    }
}

/// Reads one payload with a single bounded receive.
///
/// `Ok(None)` means the peer closed the connection without sending anything.
pub async fn read_message<R>(reader: &mut R) -> io::Result<Option<Message>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; MAX_MESSAGE_SIZE];
    let bytes = reader.read(&mut buf).await?;
    if bytes == 0 {
        return Ok(None);
    }
    Message::decode(&buf[..bytes]).map(Some)
}

pub async fn write_message<W>(writer: &mut W, message: &Message) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let encoded = message.encode()?;
    writer.write_all(&encoded).await?;
    writer.flush().await
}

fn to_io_error(err: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}
