//! Start gate
//!
//! Every long-running thread parks on the gate right after spawn. The
//! orchestrator blocks until all of them have arrived, does its one-time
//! setup, then releases everyone at once. The release instant is handed back
//! to every worker as its shared wall-clock zero.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct GateState {
    expected: usize,
    arrived: usize,
    released: Option<Instant>,
}

/// Countdown latch with a single broadcast release
#[derive(Debug)]
pub struct StartGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl StartGate {
    /// Gate for `expected` parties
    pub fn new(expected: usize) -> Self {
        Self {
            state: Mutex::new(GateState {
                expected,
                arrived: 0,
                released: None,
            }),
            changed: Condvar::new(),
        }
    }

    /// Number of parties the gate waits for
    pub fn expected(&self) -> usize {
        self.state.lock().expected
    }

    /// Parties parked so far
    pub fn arrived(&self) -> usize {
        self.state.lock().arrived
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released.is_some()
    }

    /// Park the calling thread until release; returns the shared start instant.
    ///
    /// Arriving after release returns immediately.
    pub fn arrive_and_wait(&self) -> Instant {
        let mut state = self.state.lock();
        state.arrived += 1;
        self.changed.notify_all();
        loop {
            if let Some(start) = state.released {
                return start;
            }
            self.changed.wait(&mut state);
        }
    }

    /// Block until every expected party has parked.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn wait_all_parked(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        while state.arrived < state.expected {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out() {
                        return state.arrived >= state.expected;
                    }
                }
                None => self.changed.wait(&mut state),
            }
        }
        true
    }

    /// Release every parked party. Idempotent; returns the start instant.
    pub fn release(&self) -> Instant {
        let mut state = self.state.lock();
        let start = *state.released.get_or_insert_with(Instant::now);
        self.changed.notify_all();
        start
    }
}
