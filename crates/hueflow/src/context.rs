//! Shared run context
//!
//! Everything the threads share, constructed once by the orchestrator and
//! passed around explicitly.

use hueflow_control::{BatchExecutor, ClusterRegistry, CommandQueue};
use hueflow_core::{ControlStateStore, GlobalResults, PipelineHandles, SharedOutput};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct RunContext {
    /// Published pipeline output
    pub output: SharedOutput,
    /// Operator-adjustable stages
    pub handles: PipelineHandles,
    /// Out-of-band commands
    pub queue: CommandQueue,
    /// Persisted operator state
    pub state: ControlStateStore,
    pub results: Arc<GlobalResults>,
    /// Termination flag
    pub stop: Arc<AtomicBool>,
    pub registry: ClusterRegistry,
    pub executor: Arc<dyn BatchExecutor>,
}

impl RunContext {
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}
