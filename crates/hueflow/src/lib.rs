//! Hueflow - animated looks streamed to Philips Hue bridges
//!
//! The binary wires the domain model (`hueflow-core`) to the device side
//! (`hueflow-control`):
//! - [`cli`] - Command line overrides
//! - [`orchestrator`] - Thread startup, release, shutdown and reporting
//! - [`context`] - State shared by all threads
//! - [`controls`] - Operator entry points
//! - [`signals`] - Interrupt and stats signals
//! - [`diagnostics`] - Debug dumps and the profiler hook
//! - [`logging_setup`] - tracing subscriber setup

pub mod cli;
pub mod context;
pub mod controls;
pub mod diagnostics;
pub mod logging_setup;
pub mod orchestrator;
pub mod signals;

pub use cli::Cli;
pub use context::RunContext;
pub use controls::{ControlKey, Controls};
pub use diagnostics::{Diagnostics, FrameProfiler, Profiler};
pub use orchestrator::Orchestrator;
