//! Configuration file model
//!
//! Loaded once at startup from TOML. Every section has defaults, so a file only
//! needs the bridges and the ordered light list.

use crate::error::{CoreError, Result};
use crate::grouping::{
    assign_clusters, validate_connection_budget, ClusterAssignment, FixtureId,
    HUE_BRIDGE_CONNECTION_LIMIT,
};
use crate::logging::LogConfig;
use crate::pipeline::Curve;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Control state snapshot used when `state_file` is not set
pub const DEFAULT_STATE_FILE: &str = "tmp/state.json";

/// Entry of `debug.nodes` that turns on the request history
pub const DEBUG_OUTPUT: &str = "OUTPUT";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct HueflowConfig {
    /// Bridges (clusters) by name
    pub bridges: BTreeMap<String, BridgeSettings>,
    /// Ordered global fixture list: `[bridge name, light id]`
    pub main_lights: Vec<(String, FixtureId)>,
    /// HTTP options
    pub network: NetworkConfig,
    /// Animation and scheduling
    pub simulation: SimulationConfig,
    /// Control state snapshot file
    pub state_file: Option<PathBuf>,
    /// Logging
    pub logging: LogConfig,
    /// Debug dumps and profiling
    pub debug: DebugConfig,
}

/// One hardware cluster
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeSettings {
    /// Bridge address (host or host:port)
    pub ip: String,
    /// API username (credential)
    pub username: String,
    /// Dispatch workers for this bridge
    #[serde(default = "default_one")]
    pub threads: usize,
    /// Concurrent connections per worker
    #[serde(default = "default_one")]
    pub max_connects: usize,
    /// Hardware ceiling on simultaneous connections
    #[serde(default = "default_connection_limit")]
    pub connection_limit: usize,
    /// Lights that accept `hue`
    #[serde(default)]
    pub color: Vec<FixtureId>,
    /// Lights that only accept `bri`
    #[serde(default)]
    pub dimmable: Vec<FixtureId>,
}

impl fmt::Debug for BridgeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeSettings")
            .field("ip", &self.ip)
            .field("username", &"***REDACTED***")
            .field("threads", &self.threads)
            .field("max_connects", &self.max_connects)
            .field("connection_limit", &self.connection_limit)
            .field("color", &self.color)
            .field("dimmable", &self.dimmable)
            .finish()
    }
}

fn default_one() -> usize {
    1
}

fn default_connection_limit() -> usize {
    HUE_BRIDGE_CONNECTION_LIMIT
}

/// HTTP request options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Whole-request timeout in seconds
    pub timeout_secs: f64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5.0,
            connect_timeout_secs: 5.0,
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(Duration::from_secs(5))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.connect_timeout_secs).unwrap_or(Duration::from_secs(5))
    }
}

/// Where dispatch workers take their values from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Look {
    /// Brightness from the animation pipeline
    #[default]
    Pipeline,
    /// Random quantized hue (color lights) or brightness (dimmable lights)
    Random {
        #[serde(default = "default_hue_positions")]
        hue_positions: u32,
        #[serde(default = "default_bri_positions")]
        bri_positions: u32,
        #[serde(default)]
        min_bri: u8,
        #[serde(default = "default_max_bri")]
        max_bri: u8,
    },
}

fn default_hue_positions() -> u32 {
    16
}

fn default_bri_positions() -> u32 {
    8
}

fn default_max_bri() -> u8 {
    255
}

/// Animation, controls and scheduling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Run the simulation clock (graph-driven animation)
    pub enabled: bool,
    /// Target pipeline evaluations per second
    pub frame_rate: f64,
    /// Dispatch iterations per worker; 0 runs until stopped
    pub iterations: u64,
    /// Transition time attached to every light update, in seconds
    pub transition: f64,
    /// Value source for dispatch workers
    pub look: Look,
    /// Stage parameters
    pub nodes: NodesConfig,
    /// Operator control tables
    pub controls: ControlsConfig,
    /// Periodic hue sweep
    pub sweep: SweepConfig,
    /// Command worker settings
    pub commands: CommandsConfig,
    /// How long shutdown waits for threads before abandoning them
    pub shutdown_grace_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frame_rate: 40.0,
            iterations: 0,
            transition: 0.0,
            look: Look::default(),
            nodes: NodesConfig::default(),
            controls: ControlsConfig::default(),
            sweep: SweepConfig::default(),
            commands: CommandsConfig::default(),
            shutdown_grace_ms: 250,
        }
    }
}

impl SimulationConfig {
    /// Target duration of one pipeline tick
    pub fn frame_period(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.frame_rate).unwrap_or(Duration::from_millis(25))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct NodesConfig {
    pub perlin: PerlinConfig,
    pub contrast: ContrastConfig,
    pub spotlight: SpotlightConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerlinConfig {
    pub seed: u64,
    /// `[fixture spread, time scale]`
    pub speed: [f64; 2],
}

impl Default for PerlinConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            speed: [0.1, 0.1],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContrastConfig {
    /// Curve name, see [`Curve`]
    pub function: String,
    pub iterations: u32,
}

impl Default for ContrastConfig {
    fn default() -> Self {
        Self {
            function: Curve::Cubic.name().to_string(),
            iterations: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SpotlightConfig {
    /// Value given to every fixture that is not spotlit
    pub unselected: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ControlsConfig {
    pub intensity: IntensityControl,
    pub saturation: SaturationControl,
    pub spotlighting: SpotlightingControl,
}

/// Selectable `[min, max]` windows for the per-cluster Range stages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntensityControl {
    pub values: Vec<[f32; 2]>,
}

impl Default for IntensityControl {
    fn default() -> Self {
        Self {
            values: vec![[0.0, 1.0]],
        }
    }
}

/// Selectable saturation levels, sent as group commands
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SaturationControl {
    pub values: Vec<u8>,
    /// Transition in seconds
    pub transition: f64,
    /// `[bridge name, group id]`, one per saturation control
    pub groups: Vec<(String, u32)>,
}

/// Spotlight selector layout: rows of fixture indices
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SpotlightingControl {
    pub mappings: Vec<Vec<usize>>,
}

impl SpotlightingControl {
    /// Fixture index for a flattened selector position
    pub fn index_for(&self, position: usize) -> Option<usize> {
        self.mappings.iter().flatten().nth(position).copied()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SweepConfig {
    pub enabled: bool,
    /// Hue values cycled through
    pub values: Vec<u16>,
    /// Seconds per value
    pub length: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            values: Vec::new(),
            length: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CommandsConfig {
    /// Sleep between checks of an empty queue
    pub poll_interval_ms: u64,
    /// Concurrent connections used to flush a command batch
    pub max_connects: usize,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            max_connects: 1,
        }
    }
}

impl CommandsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Debug dumps written under `dir` at shutdown
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Stage names whose output is recorded every tick; `OUTPUT` records
    /// every request instead
    pub nodes: Vec<String>,
    /// Run the frame profiler between release and shutdown
    pub profile: bool,
    /// Where dumps are written
    pub dir: PathBuf,
    /// Frames per stage (and requests) kept before recording stops
    pub max_records: usize,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            profile: false,
            dir: PathBuf::from("tmp"),
            max_records: 100_000,
        }
    }
}

impl DebugConfig {
    /// Requested stage names, upper-cased, without `OUTPUT`
    pub fn stage_names(&self) -> Vec<String> {
        self.nodes
            .iter()
            .map(|name| name.trim().to_uppercase())
            .filter(|name| !name.is_empty() && name != DEBUG_OUTPUT)
            .collect()
    }

    /// Whether the request history is recorded
    pub fn record_requests(&self) -> bool {
        self.nodes
            .iter()
            .any(|name| name.trim().eq_ignore_ascii_case(DEBUG_OUTPUT))
    }

    /// Whether anything gets dumped at shutdown
    pub fn is_enabled(&self) -> bool {
        self.profile || self.nodes.iter().any(|name| !name.trim().is_empty())
    }
}

/// Seconds that must convert to a [`Duration`]
fn check_seconds(name: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::config(format!(
            "{} must be a finite, non-negative number of seconds, got {}",
            name, value
        )));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|_| CoreError::config(format!("{} is out of range: {}", name, value)))
}

impl HueflowConfig {
    /// Read and parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Snapshot file, defaulting to `tmp/state.json`
    pub fn state_path(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
    }

    /// Number of fixtures driven by the pipeline
    pub fn light_count(&self) -> usize {
        self.main_lights.len()
    }

    /// Worker count per bridge
    pub fn worker_counts(&self) -> BTreeMap<String, usize> {
        self.bridges
            .iter()
            .map(|(name, bridge)| (name.clone(), bridge.threads))
            .collect()
    }

    /// Per-cluster fixture groups and their worker split
    pub fn clusters(&self) -> Result<Vec<ClusterAssignment>> {
        assign_clusters(&self.main_lights, &self.worker_counts())
    }

    /// Run every startup check. Nothing may be spawned if this fails.
    pub fn validate(&self) -> Result<Vec<ClusterAssignment>> {
        if self.main_lights.is_empty() {
            return Err(CoreError::config("No lights configured (main_lights is empty)"));
        }

        for (name, bridge) in &self.bridges {
            validate_connection_budget(bridge.max_connects, bridge.threads, bridge.connection_limit)
                .map_err(|e| CoreError::config(format!("Bridge '{}': {}", name, e)))?;
        }

        let clusters = self.clusters()?;
        let sim = &self.simulation;

        if !(sim.frame_rate.is_finite() && sim.frame_rate > 0.0) {
            return Err(CoreError::config(format!(
                "frame_rate must be positive, got {}",
                sim.frame_rate
            )));
        }
        check_seconds("frame period (1 / frame_rate)", 1.0 / sim.frame_rate)?;
        check_seconds("network.timeout_secs", self.network.timeout_secs)?;
        check_seconds("network.connect_timeout_secs", self.network.connect_timeout_secs)?;
        check_seconds("simulation.transition", sim.transition)?;
        check_seconds(
            "controls.saturation.transition",
            sim.controls.saturation.transition,
        )?;
        sim.nodes.contrast.function.parse::<Curve>()?;

        if sim.controls.intensity.values.is_empty() {
            return Err(CoreError::config("controls.intensity.values must not be empty"));
        }

        for (bridge, group) in &sim.controls.saturation.groups {
            if !self.bridges.contains_key(bridge) {
                return Err(CoreError::config(format!(
                    "Saturation group {} refers to unknown bridge '{}'",
                    group, bridge
                )));
            }
        }

        let lights = self.light_count();
        if let Some(index) = sim
            .controls
            .spotlighting
            .mappings
            .iter()
            .flatten()
            .find(|index| **index >= lights)
        {
            return Err(CoreError::config(format!(
                "Spotlight mapping {} is out of range ({} lights)",
                index, lights
            )));
        }

        if sim.sweep.enabled
            && (sim.sweep.values.is_empty() || !(sim.sweep.length.is_finite() && sim.sweep.length > 0.0))
        {
            return Err(CoreError::config(
                "sweep needs at least one value and a positive length",
            ));
        }

        if sim.commands.max_connects == 0 {
            return Err(CoreError::config("commands.max_connects must be at least 1"));
        }

        Ok(clusters)
    }

    /// Bridges where dispatch plus a command flush can exceed the connection
    /// limit. Not an error: the budget only covers dispatch workers.
    pub fn connection_headroom_warnings(&self) -> Vec<String> {
        let commands = self.simulation.commands.max_connects;
        self.bridges
            .iter()
            .filter_map(|(name, bridge)| {
                let dispatch = bridge.max_connects.saturating_mul(bridge.threads);
                let peak = dispatch.saturating_add(commands);
                (peak > bridge.connection_limit).then(|| {
                    format!(
                        "Bridge '{}': {} dispatch connections plus {} for commands can reach {} (limit {})",
                        name, dispatch, commands, peak, bridge.connection_limit
                    )
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
main_lights = [["Bridge-01", 1], ["Bridge-01", 2], ["Bridge-02", 7]]
state_file = "tmp/state.json"

[bridges.Bridge-01]
ip = "192.168.2.8"
username = "1234567890"
threads = 2
max_connects = 3

[bridges.Bridge-02]
ip = "192.168.2.45"
username = "1234567890"

[simulation]
frame_rate = 20.0
iterations = 100

[simulation.nodes.contrast]
function = "quintic"
iterations = 3

[simulation.controls.intensity]
values = [[0.0, 0.25], [0.0, 1.0]]

[simulation.look]
kind = "random"
hue_positions = 8
"#;

    #[test]
    fn test_parse_sample() {
        let config = HueflowConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.light_count(), 3);
        assert_eq!(config.main_lights[2], ("Bridge-02".to_string(), FixtureId(7)));
        assert_eq!(config.bridges["Bridge-01"].threads, 2);
        assert_eq!(config.bridges["Bridge-02"].max_connects, 1);
        assert_eq!(config.bridges["Bridge-02"].connection_limit, 6);
        assert_eq!(config.simulation.frame_period(), Duration::from_millis(50));
        assert_eq!(config.simulation.nodes.contrast.iterations, 3);
        assert_eq!(
            config.simulation.look,
            Look::Random {
                hue_positions: 8,
                bri_positions: 8,
                min_bri: 0,
                max_bri: 255
            }
        );

        let clusters = config.validate().unwrap();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].workers.len(), 2);
    }

    #[test]
    fn test_budget_violation_rejected() {
        let mut config = HueflowConfig::from_toml_str(SAMPLE).unwrap();
        let bridge = config.bridges.get_mut("Bridge-01").unwrap();
        bridge.max_connects = 4;
        assert!(matches!(config.validate(), Err(CoreError::Configuration(_))));
    }

    #[test]
    fn test_more_threads_than_lights_rejected() {
        let mut config = HueflowConfig::from_toml_str(SAMPLE).unwrap();
        config.bridges.get_mut("Bridge-02").unwrap().threads = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_config_rejected() {
        assert!(HueflowConfig::default().validate().is_err());
    }

    #[test]
    fn test_bad_curve_rejected() {
        let mut config = HueflowConfig::from_toml_str(SAMPLE).unwrap();
        config.simulation.nodes.contrast.function = "wobbly".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spotlight_mapping_positions() {
        let control = SpotlightingControl {
            mappings: vec![vec![4, 5], vec![9]],
        };
        assert_eq!(control.index_for(0), Some(4));
        assert_eq!(control.index_for(2), Some(9));
        assert_eq!(control.index_for(3), None);
    }

    #[test]
    fn test_debug_redacts_username() {
        let config = HueflowConfig::from_toml_str(SAMPLE).unwrap();
        let debug = format!("{:?}", config.bridges["Bridge-01"]);
        assert!(debug.contains("***REDACTED***"));
        assert!(!debug.contains("1234567890"));
        assert!(debug.contains("192.168.2.8"));
    }

    #[test]
    fn test_non_finite_durations_rejected() {
        let mut config = HueflowConfig::from_toml_str(SAMPLE).unwrap();
        config.network.timeout_secs = f64::INFINITY;
        assert!(matches!(config.validate(), Err(CoreError::Configuration(_))));

        let mut config = HueflowConfig::from_toml_str(SAMPLE).unwrap();
        config.network.connect_timeout_secs = -1.0;
        assert!(config.validate().is_err());

        let mut config = HueflowConfig::from_toml_str(SAMPLE).unwrap();
        config.simulation.frame_rate = 1e-300;
        assert!(config.validate().is_err());
        // The accessor never panics, even on an unvalidated value.
        let _ = config.simulation.frame_period();

        let mut config = HueflowConfig::from_toml_str(SAMPLE).unwrap();
        config.simulation.transition = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_infinite_timeout_from_toml() {
        let text = format!("{}\n[network]\ntimeout_secs = inf\n", SAMPLE);
        let config = HueflowConfig::from_toml_str(&text).unwrap();
        assert!(config.network.timeout_secs.is_infinite());
        assert!(config.validate().is_err());
        assert_eq!(config.network.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_command_headroom_warning() {
        let mut config = HueflowConfig::from_toml_str(SAMPLE).unwrap();
        // Bridge-01: 2 x 3 = 6 of 6, one more for commands.
        let warnings = config.connection_headroom_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Bridge-01"));
        assert!(config.validate().is_ok());

        config.bridges.get_mut("Bridge-01").unwrap().max_connects = 2;
        assert!(config.connection_headroom_warnings().is_empty());
    }

    #[test]
    fn test_debug_nodes() {
        let debug = DebugConfig {
            nodes: vec!["perlin".into(), " Output ".into(), "SHIFTED_0".into(), "".into()],
            ..DebugConfig::default()
        };
        assert_eq!(debug.stage_names(), vec!["PERLIN", "SHIFTED_0"]);
        assert!(debug.record_requests());
        assert!(debug.is_enabled());
        assert!(!DebugConfig::default().is_enabled());
    }
}
