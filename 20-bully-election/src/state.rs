//! Shared election state.
//!
//! The only mutable state shared between tasks: who this process believes is
//! coordinator, and whether it is in the middle of an election pass. Both
//! fields live behind one mutex, and every read or write goes through a
//! method here so that no lock is ever held across an `.await`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::peer::Pid;

/// Snapshot of the guarded record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorState {
    pub coordinator: Option<Pid>,
    pub in_election: bool,
}

/// Logical role of a process, derived from [`CoordinatorState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Idle,
    Electing,
    Coordinator,
}

impl CoordinatorState {
    pub fn role(&self, me: Pid) -> Role {
        if self.in_election {
            Role::Electing
        } else if self.coordinator == Some(me) {
            Role::Coordinator
        } else {
            Role::Idle
        }
    }
}

/// What the failure detector should do on this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watch {
    /// Electing already, or this process is the coordinator.
    Skip,
    /// No coordinator known yet.
    Elect,
    /// Send a heartbeat to this coordinator.
    Probe(Pid),
}

/// The guarded record plus the generation of the latest election pass.
#[derive(Debug, Default)]
struct Record {
    state: CoordinatorState,
    pass: u64,
}

#[derive(Debug)]
pub struct ElectionState {
    id: Pid,
    inner: Mutex<Record>,
}

impl ElectionState {
    pub fn new(id: Pid) -> Self {
        Self {
            id,
            inner: Mutex::new(Record::default()),
        }
    }

    // Poisoning is ignored: every critical section leaves the record consistent.
    fn lock(&self) -> MutexGuard<'_, Record> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> CoordinatorState {
        self.lock().state
    }

    pub fn coordinator(&self) -> Option<Pid> {
        self.lock().state.coordinator
    }

    pub fn is_coordinator(&self) -> bool {
        self.lock().state.coordinator == Some(self.id)
    }

    pub fn role(&self) -> Role {
        self.lock().state.role(self.id)
    }

    /// Sets `in_election` unless it is already set. Returns the generation of
    /// the pass this caller now owns.
    fn try_begin_election(&self) -> Option<u64> {
        let mut record = self.lock();
        if record.state.in_election {
            return None;
        }
        record.state.in_election = true;
        record.pass += 1;
        Some(record.pass)
    }

    /// Clears `in_election` if `pass` is still the latest pass. A pass settled
    /// by an announcement must not end a pass that started after it.
    fn finish_election(&self, pass: u64) {
        let mut record = self.lock();
        if record.pass == pass {
            record.state.in_election = false;
        }
    }

    /// Records an announced coordinator. Any election this process was running
    /// is settled by the announcement. Returns whether the coordinator changed.
    pub fn adopt(&self, coordinator: Pid) -> bool {
        let mut record = self.lock();
        let state = &mut record.state;
        let changed = state.coordinator != Some(coordinator);
        state.coordinator = Some(coordinator);
        state.in_election = false;
        changed
    }

    /// Declares this process coordinator. Returns `false` without touching the
    /// record when it already is coordinator and no election is pending.
    pub fn claim_victory(&self) -> bool {
        let mut record = self.lock();
        let state = &mut record.state;
        if state.coordinator == Some(self.id) && !state.in_election {
            return false;
        }
        state.coordinator = Some(self.id);
        true
    }

    pub fn watch(&self) -> Watch {
        let state = self.lock().state;
        if state.in_election || state.coordinator == Some(self.id) {
            return Watch::Skip;
        }
        match state.coordinator {
            None => Watch::Elect,
            Some(coordinator) => Watch::Probe(coordinator),
        }
    }
}

/// Ownership of the in-election flag for one election pass.
///
/// The flag is cleared when the pass is dropped, which covers early returns
/// and cancellation of the task running the pass.
#[derive(Debug)]
pub struct ElectionPass<'a> {
    state: &'a ElectionState,
    generation: u64,
}

impl<'a> ElectionPass<'a> {
    /// Returns `None` while another pass holds the flag.
    pub fn begin(state: &'a ElectionState) -> Option<Self> {
        let generation = state.try_begin_election()?;
        Some(Self { state, generation })
    }
}

impl Drop for ElectionPass<'_> {
    fn drop(&mut self) {
        self.state.finish_election(self.generation);
    }
}
