//! Heartbeat-driven failure detector.

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::message::Message;
use crate::node::Node;
use crate::peer::Pid;
use crate::state::Watch;

/// Outcome of one failure-detector cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Electing already, or this process is the coordinator.
    Skipped,
    /// No coordinator was known, so an election was run instead of a probe.
    NoCoordinator,
    Alive(Pid),
    /// The coordinator missed its heartbeat and an election was run.
    Unresponsive(Pid),
}

impl Node {
    /// Runs one failure-detector cycle.
    pub async fn check_coordinator(&self) -> Check {
        let coordinator = match self.state().watch() {
            Watch::Skip => return Check::Skipped,
            Watch::Elect => {
                debug!("no coordinator known, starting election");
                self.start_election().await;
                return Check::NoCoordinator;
            }
            Watch::Probe(coordinator) => coordinator,
        };

        let heartbeat = Message::Heartbeat { sender: self.id() };
        match self.messenger().send(coordinator, &heartbeat).await {
            Some(_) => Check::Alive(coordinator),
            None => {
                warn!(coordinator, "coordinator did not respond, starting election");
                self.start_election().await;
                Check::Unresponsive(coordinator)
            }
        }
    }
}

/// Checks the coordinator once per heartbeat interval, forever.
pub(crate) async fn run(node: &Node) {
    let period = node.timings().heartbeat_interval;
    loop {
        sleep(period).await;
        node.check_coordinator().await;
    }
}
