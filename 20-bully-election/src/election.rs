//! The Bully election pass.
//!
//! A pass challenges every higher id in ascending order. Any `RESPOSTA` means a
//! live process outranks us and will announce itself; a `COORDENADOR` reply
//! means an incumbent rejected the challenge and we adopt it on the spot. With
//! no replies at all, this process declares itself coordinator.
//!
//! The incumbent short-circuit departs from the textbook algorithm: a process
//! that believes it is coordinator answers a challenge with its own id, and
//! the challenger stops fanning out, even if a higher process is alive further
//! down the list.

use futures::future::join_all;
use tokio::select;
use tracing::{Instrument, debug, info};

use crate::message::Message;
use crate::node::Node;
use crate::peer::Pid;
use crate::state::ElectionPass;

impl Node {
    /// Runs one election pass. A no-op while another pass is in progress.
    pub async fn start_election(&self) {
        let Some(_pass) = ElectionPass::begin(self.state()) else {
            debug!("election already in progress");
            return;
        };
        info!("starting election");

        let higher = self.peers().higher_ids(self.id());
        if higher.is_empty() {
            self.announce_victory().await;
            return;
        }

        let challenge = Message::Election { sender: self.id() };
        let mut answers = 0usize;
        for pid in higher {
            info!(peer = pid, "sending ELECTION");
            match self.messenger().send(pid, &challenge).await {
                Some(Message::Coordinator { coordinator, .. }) => {
                    info!(
                        peer = pid,
                        coordinator, "election annulled, coordinator already in place"
                    );
                    self.adopt_coordinator(coordinator);
                    return;
                }
                Some(Message::Answer { sender }) => {
                    info!(peer = sender, "received RESPOSTA");
                    answers += 1;
                }
                Some(other) => debug!(peer = pid, reply = ?other, "ignoring unexpected reply"),
                None => debug!(peer = pid, "no reply to ELECTION"),
            }
        }

        if answers == 0 {
            self.announce_victory().await;
        } else {
            info!(answers, "higher processes are alive, waiting for their announcement");
        }
    }

    /// Declares this process coordinator and tells every other peer.
    ///
    /// Does nothing when this process already is coordinator and no election
    /// is pending.
    pub async fn announce_victory(&self) {
        if !self.state().claim_victory() {
            debug!("already coordinator, skipping announcement");
            return;
        }
        info!("election won, this process is now coordinator");

        let announcement = Message::announcement(self.id());
        let sends = self.peers().others(self.id()).into_iter().map(|pid| {
            let messenger = self.messenger();
            async move {
                info!(peer = pid, "announcing COORDENADOR");
                messenger.send(pid, &announcement).await
            }
        });
        join_all(sends).await;
    }

    /// Applies an announced (or incumbent-reported) coordinator.
    pub fn adopt_coordinator(&self, coordinator: Pid) {
        if self.state().adopt(coordinator) {
            info!(coordinator, "new coordinator");
        }
    }

    /// Starts an election pass in the background; it stops with the node.
    pub(crate) fn spawn_election(&self) {
        let node = self.clone();
        let shutdown = self.shutdown_token().clone();
        tokio::spawn(
            async move {
                select! {
                    _ = shutdown.cancelled() => {}
                    _ = node.start_election() => {}
                }
            }
            .in_current_span(),
        );
    }
}
