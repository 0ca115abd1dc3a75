//! Worker lifecycle
//!
//! `Created -> Parked -> Released -> Running -> Terminating -> Stopped`.
//! Each long-running thread is spawned through [`spawn_worker`], which parks
//! it on the [`StartGate`], runs its body, and turns errors and panics into a
//! typed [`WorkerOutcome`] so a crash stays confined to that one thread.

use crate::error::{ControlError, Result};
use crate::gate::StartGate;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum WorkerState {
    Created = 0,
    Parked = 1,
    Released = 2,
    Running = 3,
    Terminating = 4,
    Stopped = 5,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Created,
            1 => WorkerState::Parked,
            2 => WorkerState::Released,
            3 => WorkerState::Running,
            4 => WorkerState::Terminating,
            _ => WorkerState::Stopped,
        }
    }
}

/// Lifecycle state observable from other threads
#[derive(Debug)]
pub struct WorkerStatus(AtomicU8);

impl WorkerStatus {
    pub fn new() -> Self {
        Self(AtomicU8::new(WorkerState::Created as u8))
    }

    pub fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for WorkerStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// How a worker's loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Ran its configured iteration count
    Completed,
    /// Observed the termination flag
    Stopped,
    /// Failed; the worker does not restart
    Crashed(String),
}

impl WorkerOutcome {
    pub fn is_crashed(&self) -> bool {
        matches!(self, WorkerOutcome::Crashed(_))
    }
}

impl fmt::Display for WorkerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerOutcome::Completed => write!(f, "completed"),
            WorkerOutcome::Stopped => write!(f, "stopped"),
            WorkerOutcome::Crashed(reason) => write!(f, "crashed: {}", reason),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A spawned worker thread
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    status: Arc<WorkerStatus>,
    thread: JoinHandle<WorkerOutcome>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WorkerState {
        self.status.get()
    }

    /// Whether the thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the thread; a panic that escaped the harness maps to `Crashed`.
    pub fn join(self) -> WorkerOutcome {
        match self.thread.join() {
            Ok(outcome) => outcome,
            Err(payload) => WorkerOutcome::Crashed(panic_message(payload.as_ref())),
        }
    }
}

/// Spawn a named worker thread parked on `gate`.
///
/// `body` receives the shared start instant once the gate is released.
pub fn spawn_worker<F>(name: impl Into<String>, gate: Arc<StartGate>, body: F) -> Result<WorkerHandle>
where
    F: FnOnce(Instant) -> Result<WorkerOutcome> + Send + 'static,
{
    let name = name.into();
    let status = Arc::new(WorkerStatus::new());

    let thread = {
        let err_name = name.clone();
        let name = name.clone();
        let status = Arc::clone(&status);
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                status.set(WorkerState::Parked);
                let start = gate.arrive_and_wait();
                status.set(WorkerState::Released);
                debug!(worker = %name, "Released");

                status.set(WorkerState::Running);
                let outcome = match panic::catch_unwind(AssertUnwindSafe(|| body(start))) {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => {
                        error!(worker = %name, "Worker failed: {} ({:?})", e, e);
                        WorkerOutcome::Crashed(e.to_string())
                    }
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!(worker = %name, "Worker panicked: {}", message);
                        WorkerOutcome::Crashed(message)
                    }
                };

                status.set(WorkerState::Terminating);
                info!(worker = %name, "Worker {} after {:.2}s", outcome, start.elapsed().as_secs_f64());
                status.set(WorkerState::Stopped);
                outcome
            })
            .map_err(|e| ControlError::Runtime(format!("Failed to spawn {}: {}", err_name, e)))?
    };

    Ok(WorkerHandle {
        name,
        status,
        thread,
    })
}
