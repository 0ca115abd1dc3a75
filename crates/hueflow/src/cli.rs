//! Command line overrides for the config file

use clap::Parser;
use hueflow_core::HueflowConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Config file (TOML).
    #[arg(long, short, env = "HUEFLOW_CONFIG", default_value = "hueflow.toml")]
    pub config: PathBuf,

    /// Dispatch iterations per worker (0 = run until interrupted).
    #[arg(long, env = "ITERATIONS")]
    pub iterations: Option<u64>,

    /// Dispatch workers per bridge, for every bridge.
    #[arg(long, env = "THREADS")]
    pub threads: Option<usize>,

    /// Concurrent connections per worker, for every bridge.
    #[arg(long, env = "MAX_CONNECTS")]
    pub max_connects: Option<usize>,

    /// Dry run: count every request as successful without sending it.
    #[arg(long, env = "NO_LIGHTS")]
    pub no_lights: bool,

    /// Do not run the simulation clock.
    #[arg(long, env = "NO_GRAPH")]
    pub no_graph: bool,

    /// Enable the periodic hue sweep.
    #[arg(long, env = "SWEEP")]
    pub sweep: bool,

    /// Debug-level logging.
    #[arg(long, short, env = "VERBOSE")]
    pub verbose: bool,

    /// Stages whose output is dumped at exit (comma separated); OUTPUT dumps every request.
    #[arg(long, env = "DEBUG_NODES", value_delimiter = ',')]
    pub debug_nodes: Vec<String>,

    /// Profile simulation frame times and dump the report at exit.
    #[arg(long, env = "PROFILE_RUN")]
    pub profile: bool,
}

impl Cli {
    /// Apply overrides on top of the loaded file
    pub fn apply(&self, config: &mut HueflowConfig) {
        if let Some(iterations) = self.iterations {
            config.simulation.iterations = iterations;
        }
        for bridge in config.bridges.values_mut() {
            if let Some(threads) = self.threads {
                bridge.threads = threads;
            }
            if let Some(max_connects) = self.max_connects {
                bridge.max_connects = max_connects;
            }
        }
        if self.no_graph {
            config.simulation.enabled = false;
        }
        if self.sweep {
            config.simulation.sweep.enabled = true;
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
        if !self.debug_nodes.is_empty() {
            config.debug.nodes = self.debug_nodes.clone();
        }
        if self.profile {
            config.debug.profile = true;
        }
    }

    pub fn lights_enabled(&self) -> bool {
        !self.no_lights
    }
}
