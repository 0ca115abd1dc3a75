//! Debug history
//!
//! Per-tick recordings of selected stage outputs and frame timing, filled in
//! by the simulation clock and dumped as JSON at shutdown.

use crate::error::Result;
use crate::pipeline::Pipeline;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// One recorded tick of one stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFrame {
    /// Simulation time of the tick, in seconds
    pub t: f64,
    pub values: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct StageDump<'a> {
    stage: &'a str,
    frames: &'a [StageFrame],
}

#[derive(Debug, Default)]
struct Recorded {
    frames: Vec<Vec<StageFrame>>,
    full: bool,
}

/// Output history of the stages under debug
#[derive(Debug)]
pub struct StageHistory {
    stages: Vec<String>,
    max_frames: usize,
    recorded: Mutex<Recorded>,
}

impl StageHistory {
    pub fn new(stages: Vec<String>, max_frames: usize) -> Self {
        let frames = stages.iter().map(|_| Vec::new()).collect();
        Self {
            stages,
            max_frames,
            recorded: Mutex::new(Recorded {
                frames,
                full: false,
            }),
        }
    }

    /// Stage names being recorded
    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    /// Copy the named stages' current buffers. Stops at `max_frames` per stage.
    pub fn record(&self, t: f64, pipeline: &Pipeline) {
        let mut recorded = self.recorded.lock();
        if recorded.full {
            return;
        }
        if recorded.frames.first().map_or(0, Vec::len) >= self.max_frames {
            recorded.full = true;
            warn!("Stage history reached {} frames, no longer recording", self.max_frames);
            return;
        }
        for (stage, frames) in self.stages.iter().zip(recorded.frames.iter_mut()) {
            if let Some(values) = pipeline.stage_output(stage) {
                frames.push(StageFrame {
                    t,
                    values: values.to_vec(),
                });
            }
        }
    }

    /// Recorded frames of one stage
    pub fn frames(&self, stage: &str) -> Vec<StageFrame> {
        let recorded = self.recorded.lock();
        self.stages
            .iter()
            .position(|s| s == stage)
            .and_then(|i| recorded.frames.get(i).cloned())
            .unwrap_or_default()
    }

    /// Write `<prefix>_<NN>_<stage>.json` per stage into `dir`
    pub fn write_json(&self, dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let recorded = self.recorded.lock();
        let mut written = Vec::with_capacity(self.stages.len());

        for (index, (stage, frames)) in self.stages.iter().zip(&recorded.frames).enumerate() {
            let path = dir.join(format!(
                "{}_{:02}_{}.json",
                prefix,
                index,
                stage.to_lowercase()
            ));
            let dump = StageDump { stage, frames };
            fs::write(&path, serde_json::to_vec(&dump)?)?;
            debug!("Wrote {} frames of {} to {:?}", frames.len(), stage, path);
            written.push(path);
        }
        Ok(written)
    }
}

/// Running compute-time statistics of the simulation clock
#[derive(Debug, Default)]
pub struct FrameStats {
    inner: Mutex<FrameSummary>,
}

/// Snapshot of [`FrameStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FrameSummary {
    pub ticks: u64,
    /// Ticks whose compute exceeded the frame period
    pub overruns: u64,
    pub total_us: u64,
    pub max_us: u64,
}

impl FrameSummary {
    pub fn mean_us(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.total_us as f64 / self.ticks as f64
        }
    }
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, compute: Duration, period: Duration) {
        let micros = u64::try_from(compute.as_micros()).unwrap_or(u64::MAX);
        let mut summary = self.inner.lock();
        summary.ticks += 1;
        summary.total_us = summary.total_us.saturating_add(micros);
        summary.max_us = summary.max_us.max(micros);
        if compute > period {
            summary.overruns += 1;
        }
    }

    pub fn summary(&self) -> FrameSummary {
        *self.inner.lock()
    }
}
