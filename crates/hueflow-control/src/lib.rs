//! Hueflow Control - Device Dispatch
//!
//! This crate moves pipeline values onto the wire:
//! - **Hue**: v1 REST endpoints and state bodies
//! - **Batch execution**: throttled reqwest executor plus a dry-run executor
//! - **Workers**: start gate, lifecycle harness, dispatch workers
//! - **Commands**: out-of-band command queue, its worker and the hue sweep
//!
//! ## Modules
//!
//! - [`hue`] - Philips Hue REST protocol
//! - [`request`] - Device requests
//! - [`batch`] - Batch execution abstraction
//! - [`registry`] - Static cluster address mapping
//! - [`gate`] - Start gate (countdown latch)
//! - [`worker`] - Worker lifecycle and outcomes
//! - [`dispatch`] - Per-cluster dispatch workers
//! - [`commands`] - Command queue and worker
//! - [`sweep`] - Periodic hue sweep
//! - [`history`] - Request history for debug dumps
//! - [`error`] - Error types

/// Batch execution
pub mod batch;
/// Command queue and worker
pub mod commands;
/// Dispatch workers
pub mod dispatch;
/// Error types
pub mod error;
/// Start gate
pub mod gate;
/// Request history
pub mod history;
/// Philips Hue protocol
pub mod hue;
/// Cluster registry
pub mod registry;
/// Device requests
pub mod request;
/// Hue sweep
pub mod sweep;
/// Worker lifecycle
pub mod worker;

// Re-exports
pub use batch::{BatchExecutor, HttpBatchExecutor, NullExecutor, ResponseHandler};
pub use commands::{CommandQueue, CommandWorker};
pub use dispatch::{DispatchSettings, DispatchWorker, RandomLook, ValueSource};
pub use error::{ControlError, Result};
pub use gate::StartGate;
pub use history::{Recording, RequestHistory, RequestRecord};
pub use hue::{BridgeEndpoint, LightState};
pub use registry::ClusterRegistry;
pub use request::{DeviceRequest, Target};
pub use sweep::Sweeper;
pub use worker::{spawn_worker, WorkerHandle, WorkerOutcome, WorkerState, WorkerStatus};
