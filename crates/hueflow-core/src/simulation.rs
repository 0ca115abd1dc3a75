//! Simulation clock
//!
//! Re-evaluates the pipeline at a target frame period. Late frames are not
//! compensated: if a tick overruns, the next one starts immediately.

use crate::history::{FrameStats, StageHistory};
use crate::pipeline::{Pipeline, SharedOutput};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Drives a [`Pipeline`] from a single thread
#[derive(Debug)]
pub struct SimulationClock {
    pipeline: Pipeline,
    frame_period: Duration,
    ticks: u64,
    overruns: u64,
    history: Option<Arc<StageHistory>>,
    stats: Option<Arc<FrameStats>>,
}

impl SimulationClock {
    pub fn new(pipeline: Pipeline, frame_period: Duration) -> Self {
        Self {
            pipeline,
            frame_period,
            ticks: 0,
            overruns: 0,
            history: None,
            stats: None,
        }
    }

    /// Record the history's stages after every tick
    pub fn with_history(mut self, history: Arc<StageHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Feed compute times into `stats`
    pub fn with_stats(mut self, stats: Arc<FrameStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Handle to the published output
    pub fn output(&self) -> SharedOutput {
        self.pipeline.output()
    }

    pub fn frame_period(&self) -> Duration {
        self.frame_period
    }

    /// Ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Ticks whose compute took longer than one frame period
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Evaluate the whole chain once at time `t`, returning the compute time.
    pub fn tick(&mut self, t: f64) -> Duration {
        let started = Instant::now();
        self.pipeline.compute(t);
        self.ticks += 1;
        let elapsed = started.elapsed();

        if let Some(history) = &self.history {
            history.record(t, &self.pipeline);
        }
        if let Some(stats) = &self.stats {
            stats.record(elapsed, self.frame_period);
        }
        elapsed
    }

    /// Tick until `stop` is set. `t` is measured in seconds from `epoch`.
    ///
    /// The flag is checked once per cycle; a tick in progress always finishes.
    pub fn run(&mut self, epoch: Instant, stop: &AtomicBool) -> u64 {
        debug!(
            "Simulation clock running at {:.1} fps",
            1.0 / self.frame_period.as_secs_f64()
        );
        let first = self.ticks;

        while !stop.load(Ordering::Acquire) {
            let t = epoch.elapsed().as_secs_f64();
            let elapsed = self.tick(t);
            if elapsed < self.frame_period {
                thread::sleep(self.frame_period - elapsed);
            } else {
                self.overruns += 1;
                trace!("Frame overran by {:?}", elapsed - self.frame_period);
            }
        }

        let ran = self.ticks - first;
        debug!("Simulation clock stopped after {} ticks ({} late)", ran, self.overruns);
        ran
    }
}
