//! Hueflow Core - Domain Model
//!
//! This crate contains everything that does not touch the network:
//! - Fixture grouping and connection-budget validation
//! - The animation pipeline (noise generator, contrast, range, spotlight)
//! - The simulation clock driving the pipeline
//! - Request outcome accounting
//! - Persisted operator control state
//! - Configuration and logging settings
//! - Debug recordings of stage output and frame timing

pub mod config;
pub mod control_state;
pub mod error;
pub mod grouping;
pub mod history;
pub mod logging;
pub mod pipeline;
pub mod results;
pub mod simulation;

// Configuration
pub use config::{BridgeSettings, DebugConfig, HueflowConfig, Look, SimulationConfig};
pub use logging::LogConfig;

// Errors
pub use error::{CoreError, Result};

// Grouping
pub use grouping::{
    assign_clusters, partition, validate_connection_budget, validate_counts, ClusterAssignment,
    FixtureGroup, FixtureId, HUE_BRIDGE_CONNECTION_LIMIT,
};

// Debug history
pub use history::{FrameStats, FrameSummary, StageFrame, StageHistory};

// Pipeline & clock
pub use pipeline::{Pipeline, PipelineHandles, RangeHandle, SharedOutput, SpotlightHandle, Stage};
pub use simulation::SimulationClock;

// Accounting & state
pub use control_state::{ControlState, ControlStateStore, ControlValue};
pub use results::{GlobalResults, Results, Throughput};
