//! Debug dumps and the profiler hook
//!
//! Everything here is off unless `[debug]` asks for it. Recordings are
//! written under `debug.dir` after shutdown, every file name starting with
//! the unix time the run was set up.

use anyhow::{Context, Result};
use hueflow_control::RequestHistory;
use hueflow_core::{DebugConfig, FrameStats, FrameSummary, StageHistory};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Started right before the parked threads are released, finished after
/// shutdown.
pub trait Profiler: Send {
    fn start(&mut self) -> Result<()>;

    /// Write whatever was collected into `dir`; returns the files written.
    fn finish(&mut self, dir: &Path, prefix: &str) -> Result<Vec<PathBuf>>;
}

#[derive(Debug, Serialize)]
struct FrameReport {
    wall_secs: f64,
    mean_us: f64,
    #[serde(flatten)]
    frames: FrameSummary,
}

/// Built-in profiler: simulation clock compute times over the run
pub struct FrameProfiler {
    stats: Arc<FrameStats>,
    started: Option<Instant>,
}

impl FrameProfiler {
    pub fn new(stats: Arc<FrameStats>) -> Self {
        Self {
            stats,
            started: None,
        }
    }
}

impl Profiler for FrameProfiler {
    fn start(&mut self) -> Result<()> {
        self.started = Some(Instant::now());
        Ok(())
    }

    fn finish(&mut self, dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
        let frames = self.stats.summary();
        let report = FrameReport {
            wall_secs: self.started.map_or(0.0, |s| s.elapsed().as_secs_f64()),
            mean_us: frames.mean_us(),
            frames,
        };
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}_profile.json", prefix));
        fs::write(&path, serde_json::to_vec_pretty(&report)?)
            .with_context(|| format!("Failed to write {:?}", path))?;
        info!(
            "Frames: {} ticks, mean {:.0}us, max {}us, {} late",
            frames.ticks, report.mean_us, frames.max_us, frames.overruns
        );
        Ok(vec![path])
    }
}

/// `%010` unix seconds, shared by every dump of one run
pub fn dump_prefix() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{:010}", secs)
}

/// Recorders and profiler for one run
pub struct Diagnostics {
    dir: PathBuf,
    prefix: String,
    stages: Option<Arc<StageHistory>>,
    requests: Option<Arc<RequestHistory>>,
    frame_stats: Option<Arc<FrameStats>>,
    profiler: Option<Box<dyn Profiler>>,
}

impl Diagnostics {
    /// Nothing recorded, nothing dumped
    pub fn disabled() -> Self {
        Self::from_config(&DebugConfig::default(), &[])
    }

    /// Set up the recorders `debug` asks for. Unknown stage names are skipped.
    pub fn from_config(debug: &DebugConfig, stage_names: &[String]) -> Self {
        let mut stages = Vec::new();
        for name in debug.stage_names() {
            if stage_names.contains(&name) {
                stages.push(name);
            } else {
                warn!("No stage named '{}' to record (have {})", name, stage_names.join(", "));
            }
        }

        let frame_stats = debug.profile.then(|| Arc::new(FrameStats::new()));
        let profiler = frame_stats
            .as_ref()
            .map(|stats| Box::new(FrameProfiler::new(Arc::clone(stats))) as Box<dyn Profiler>);

        Self {
            dir: debug.dir.clone(),
            prefix: dump_prefix(),
            stages: (!stages.is_empty())
                .then(|| Arc::new(StageHistory::new(stages, debug.max_records))),
            requests: debug
                .record_requests()
                .then(|| Arc::new(RequestHistory::new(debug.max_records))),
            frame_stats,
            profiler,
        }
    }

    pub fn stage_history(&self) -> Option<&Arc<StageHistory>> {
        self.stages.as_ref()
    }

    pub fn request_history(&self) -> Option<&Arc<RequestHistory>> {
        self.requests.as_ref()
    }

    pub fn frame_stats(&self) -> Option<&Arc<FrameStats>> {
        self.frame_stats.as_ref()
    }

    /// Replace the profiler (the frame profiler by default when profiling)
    pub fn set_profiler(&mut self, profiler: Box<dyn Profiler>) {
        self.profiler = Some(profiler);
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn start_profiler(&mut self) {
        if let Some(profiler) = self.profiler.as_mut() {
            debug!("Starting profiler");
            if let Err(e) = profiler.start() {
                warn!("Profiler failed to start: {:#}", e);
                self.profiler = None;
            }
        }
    }

    /// Finish the profiler and write every recording. Returns the files written.
    pub fn dump(&mut self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        if let Some(mut profiler) = self.profiler.take() {
            written.extend(profiler.finish(&self.dir, &self.prefix)?);
        }
        if let Some(stages) = &self.stages {
            written.extend(
                stages
                    .write_json(&self.dir, &self.prefix)
                    .context("Failed to dump stage history")?,
            );
        }
        if let Some(requests) = &self.requests {
            let path = self.dir.join(format!("{}_output.jsonl", self.prefix));
            requests
                .write_json(&path)
                .context("Failed to dump request history")?;
            if requests.dropped() > 0 {
                warn!("{} requests were not recorded", requests.dropped());
            }
            written.push(path);
        }

        if !written.is_empty() {
            info!("Dumped debug data: {:?}", written);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hueflow_core::pipeline::{Generator, Stage};
    use hueflow_core::Pipeline;
    use std::time::Duration;
    use tempfile::TempDir;

    fn debug_config(dir: &TempDir, nodes: &[&str], profile: bool) -> DebugConfig {
        DebugConfig {
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            profile,
            dir: dir.path().to_path_buf(),
            ..DebugConfig::default()
        }
    }

    #[test]
    fn test_disabled_dumps_nothing() {
        let mut diagnostics = Diagnostics::disabled();
        assert!(diagnostics.stage_history().is_none());
        assert!(diagnostics.request_history().is_none());
        assert!(diagnostics.frame_stats().is_none());
        assert!(diagnostics.dump().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_stage_names_skipped() {
        let dir = TempDir::new().unwrap();
        let names = vec!["PERLIN".to_string(), "SPOTLIT".to_string()];
        let diagnostics =
            Diagnostics::from_config(&debug_config(&dir, &["spotlit", "BOGUS", "output"], false), &names);

        assert_eq!(
            diagnostics.stage_history().unwrap().stages(),
            &["SPOTLIT".to_string()]
        );
        assert!(diagnostics.request_history().is_some());
        assert_eq!(diagnostics.prefix().len(), 10);
    }

    #[test]
    fn test_dump_writes_every_recording() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = Pipeline::builder(2)
            .stage("PERLIN", Stage::Generator(Generator::new(1, 0.1, 0.1)))
            .build()
            .unwrap();
        let names = pipeline.stage_names().to_vec();
        let mut diagnostics =
            Diagnostics::from_config(&debug_config(&dir, &["PERLIN"], true), &names);

        diagnostics.start_profiler();
        pipeline.compute(0.0);
        diagnostics.stage_history().unwrap().record(0.0, &pipeline);
        diagnostics
            .frame_stats()
            .unwrap()
            .record(Duration::from_micros(40), Duration::from_millis(25));

        let written = diagnostics.dump().unwrap();
        let prefix = diagnostics.prefix().to_string();
        assert_eq!(
            written,
            vec![
                dir.path().join(format!("{}_profile.json", prefix)),
                dir.path().join(format!("{}_00_perlin.json", prefix)),
            ]
        );

        let report: serde_json::Value =
            serde_json::from_slice(&fs::read(&written[0]).unwrap()).unwrap();
        assert_eq!(report["ticks"], 1);
        assert_eq!(report["max_us"], 40);
    }

    struct CountingProfiler(Arc<std::sync::atomic::AtomicUsize>);

    impl Profiler for CountingProfiler {
        fn start(&mut self) -> Result<()> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }

        fn finish(&mut self, _dir: &Path, _prefix: &str) -> Result<Vec<PathBuf>> {
            self.0.fetch_add(10, std::sync::atomic::Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_custom_profiler_started_and_finished_once() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut diagnostics = Diagnostics::disabled();
        diagnostics.set_profiler(Box::new(CountingProfiler(Arc::clone(&calls))));

        diagnostics.start_profiler();
        diagnostics.dump().unwrap();
        diagnostics.dump().unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 11);
    }
}
