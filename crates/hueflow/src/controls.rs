//! Operator control entry points
//!
//! A control surface calls these; each one adjusts a stage or enqueues a
//! command and records the new position in the control state store.

use crate::context::RunContext;
use hueflow_control::{ControlError, DeviceRequest, LightState, Result};
use hueflow_core::config::ControlsConfig;
use hueflow_core::pipeline::{self, SPOTLIT};
use hueflow_core::{ControlState, ControlValue};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A persisted control key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    /// `SHIFTED_<cluster>`
    Intensity(usize),
    /// `SAT_STATES[<group>]`
    Saturation(usize),
    /// `SPOTLIT`
    Spotlight,
}

impl ControlKey {
    pub fn parse(key: &str) -> Option<Self> {
        if key == SPOTLIT {
            return Some(ControlKey::Spotlight);
        }
        if let Some(idx) = key.strip_prefix("SHIFTED_") {
            return idx.parse().ok().map(ControlKey::Intensity);
        }
        key.strip_prefix("SAT_STATES[")
            .and_then(|rest| rest.strip_suffix(']'))
            .and_then(|idx| idx.parse().ok())
            .map(ControlKey::Saturation)
    }

    pub fn name(&self) -> String {
        match self {
            ControlKey::Intensity(idx) => pipeline::shifted(*idx),
            ControlKey::Saturation(idx) => format!("SAT_STATES[{}]", idx),
            ControlKey::Spotlight => SPOTLIT.to_string(),
        }
    }
}

pub struct Controls {
    ctx: Arc<RunContext>,
    config: ControlsConfig,
}

impl Controls {
    pub fn new(ctx: Arc<RunContext>, config: ControlsConfig) -> Self {
        Self { ctx, config }
    }

    fn persist(&self, key: ControlKey, value: Option<ControlValue>) {
        self.ctx.state.update(&key.name(), value);
    }

    /// Select intensity window `level` for the Range stage of cluster `cluster`
    pub fn set_intensity(&self, cluster: usize, level: usize) -> Result<()> {
        let [min, max] = *self.config.intensity.values.get(level).ok_or_else(|| {
            ControlError::InvalidParameter(format!("No intensity level {}", level))
        })?;
        let range = self.ctx.handles.ranges.get(cluster).ok_or_else(|| {
            ControlError::InvalidParameter(format!("No cluster {}", cluster))
        })?;

        range.set_range(min, max);
        debug!("Intensity {} -> [{}, {}]", cluster, min, max);
        self.persist(ControlKey::Intensity(cluster), Some(level.into()));
        Ok(())
    }

    /// Enqueue saturation `level` for saturation group `idx`
    pub fn set_saturation(&self, idx: usize, level: usize) -> Result<()> {
        let saturation = &self.config.saturation;
        let (bridge, group) = saturation.groups.get(idx).ok_or_else(|| {
            ControlError::InvalidParameter(format!("No saturation group {}", idx))
        })?;
        let sat = *saturation.values.get(level).ok_or_else(|| {
            ControlError::InvalidParameter(format!("No saturation level {}", level))
        })?;
        let endpoint = self.ctx.registry.resolve(bridge)?;

        let state = LightState::new()
            .with_sat(sat)
            .with_transition(saturation.transition);
        self.ctx
            .queue
            .enqueue(DeviceRequest::group(endpoint, *group, state));
        self.persist(ControlKey::Saturation(idx), Some(level.into()));
        Ok(())
    }

    /// Spotlight the fixture mapped to selector `position`
    pub fn spotlight(&self, position: usize) -> Result<()> {
        let index = self
            .config
            .spotlighting
            .index_for(position)
            .ok_or_else(|| {
                ControlError::InvalidParameter(format!("No spotlight position {}", position))
            })?;
        self.ctx.handles.spotlight.spotlight(index);
        self.persist(ControlKey::Spotlight, Some(position.into()));
        Ok(())
    }

    pub fn clear_spotlight(&self) {
        self.ctx.handles.spotlight.clear();
        self.persist(ControlKey::Spotlight, None);
    }

    pub fn request_exit(&self) {
        info!("Exit requested.");
        self.ctx.request_stop();
    }

    /// Replay a loaded snapshot into the stages without writing it back.
    ///
    /// Commands enqueued while replaying are dropped when the snapshot came
    /// from disk. Saturation groups the snapshot does not mention are then
    /// sent their highest level. Returns the number of entries applied.
    pub fn restore(&self, snapshot: &ControlState) -> usize {
        let mut applied = 0;
        {
            let _suppressed = self.ctx.state.suppress();
            for (key, value) in snapshot {
                let Some(control) = ControlKey::parse(key) else {
                    warn!("Ignoring unknown control state key '{}'", key);
                    continue;
                };
                let level = value.as_ref().and_then(ControlValue::as_index);
                let result = match (control, level) {
                    (ControlKey::Intensity(idx), Some(level)) => self.set_intensity(idx, level),
                    (ControlKey::Saturation(idx), Some(level)) => self.set_saturation(idx, level),
                    (ControlKey::Spotlight, Some(position)) => self.spotlight(position),
                    (ControlKey::Spotlight, None) => {
                        self.clear_spotlight();
                        Ok(())
                    }
                    (_, None) => continue,
                };
                match result {
                    Ok(()) => applied += 1,
                    Err(e) => warn!("Could not restore '{}': {}", key, e),
                }
            }
        }

        if self.ctx.state.restored() {
            let dropped = self.ctx.queue.clear();
            if dropped > 0 {
                debug!("Dropped {} commands queued during restore", dropped);
            }
        }
        let defaulted = self.default_saturation(snapshot);
        info!(
            "Restored {} control settings, {} saturation groups at max",
            applied, defaulted
        );
        applied
    }

    /// Queue the highest saturation level for every group without a saved level
    fn default_saturation(&self, snapshot: &ControlState) -> usize {
        let saturation = &self.config.saturation;
        let Some(max_level) = saturation
            .values
            .iter()
            .enumerate()
            .max_by_key(|(_, sat)| **sat)
            .map(|(level, _)| level)
        else {
            return 0;
        };

        let _suppressed = self.ctx.state.suppress();
        let mut sent = 0;
        for idx in 0..saturation.groups.len() {
            let saved = snapshot
                .get(&ControlKey::Saturation(idx).name())
                .and_then(|value| value.as_ref())
                .and_then(ControlValue::as_index);
            if saved.is_some() {
                continue;
            }
            match self.set_saturation(idx, max_level) {
                Ok(()) => sent += 1,
                Err(e) => warn!("Could not set default saturation for group {}: {}", idx, e),
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hueflow_control::{BridgeEndpoint, ClusterRegistry, CommandQueue, NullExecutor};
    use hueflow_core::config::{IntensityControl, SaturationControl, SpotlightingControl};
    use hueflow_core::pipeline::{Generator, Range, Spotlight, Stage};
    use hueflow_core::{ControlStateStore, GlobalResults, Pipeline, PipelineHandles};
    use std::sync::atomic::AtomicBool;
    use tempfile::TempDir;

    fn controls(state: ControlStateStore) -> (Controls, Pipeline) {
        let range = Range::new(vec![true, true, false], 0.0, 1.0);
        let spotlight = Spotlight::new(0.0);
        let handles = PipelineHandles {
            ranges: vec![range.handle()],
            spotlight: spotlight.handle(),
        };
        let pipeline = Pipeline::builder(3)
            .stage("PERLIN", Stage::Generator(Generator::new(1, 0.1, 0.1)))
            .stage("SHIFTED_0", Stage::Range(range))
            .stage("SPOTLIT", Stage::Spotlight(spotlight))
            .build()
            .unwrap();

        let mut registry = ClusterRegistry::new();
        registry.insert(BridgeEndpoint::new("A", "10.0.0.2", "u"));

        let ctx = RunContext {
            output: pipeline.output(),
            handles,
            queue: CommandQueue::new(),
            state,
            results: Arc::new(GlobalResults::new()),
            stop: Arc::new(AtomicBool::new(false)),
            registry,
            executor: Arc::new(NullExecutor),
        };
        let config = ControlsConfig {
            intensity: IntensityControl {
                values: vec![[0.0, 1.0], [0.2, 0.4]],
            },
            saturation: SaturationControl {
                values: vec![0, 127, 254],
                transition: 0.4,
                groups: vec![("A".to_string(), 3)],
            },
            spotlighting: SpotlightingControl {
                mappings: vec![vec![2, 1], vec![0]],
            },
        };
        (Controls::new(Arc::new(ctx), config), pipeline)
    }

    #[test]
    fn test_key_names() {
        for key in [
            ControlKey::Intensity(2),
            ControlKey::Saturation(0),
            ControlKey::Spotlight,
        ] {
            assert_eq!(ControlKey::parse(&key.name()), Some(key));
        }
        assert_eq!(ControlKey::parse("SHIFTED_x"), None);
        assert_eq!(ControlKey::parse("OTHER"), None);
    }

    #[test]
    fn test_setters_adjust_stages_and_persist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let (controls, _pipeline) = controls(ControlStateStore::open(&path).unwrap());

        controls.set_intensity(0, 1).unwrap();
        assert_eq!(controls.ctx.handles.ranges[0].range(), (0.2, 0.4));

        controls.spotlight(1).unwrap();
        assert_eq!(controls.ctx.handles.spotlight.selected(), Some(1));

        controls.set_saturation(0, 2).unwrap();
        let queued = controls.ctx.queue.drain();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].body.sat, Some(254));
        assert_eq!(queued[0].body.transitiontime, Some(4));

        let saved = ControlStateStore::open(&path).unwrap();
        assert_eq!(saved.get("SHIFTED_0"), Some(ControlValue::Int(1)));
        assert_eq!(saved.get("SPOTLIT"), Some(ControlValue::Int(1)));
        assert_eq!(saved.get("SAT_STATES[0]"), Some(ControlValue::Int(2)));

        controls.clear_spotlight();
        assert_eq!(controls.ctx.handles.spotlight.selected(), None);
        assert!(controls.set_intensity(0, 9).is_err());
        assert!(controls.set_intensity(4, 0).is_err());
    }

    #[test]
    fn test_restore_does_not_write_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let mut snapshot = ControlState::new();
        snapshot.insert("SHIFTED_0".to_string(), Some(ControlValue::Int(1)));
        snapshot.insert("SAT_STATES[0]".to_string(), Some(ControlValue::Int(1)));
        snapshot.insert("SPOTLIT".to_string(), Some(ControlValue::Int(2)));
        hueflow_core::control_state::save(&path, &snapshot).unwrap();
        let before = std::fs::metadata(&path).unwrap().modified().unwrap();

        let store = ControlStateStore::open(&path).unwrap();
        let (controls, _pipeline) = controls(store);
        let loaded = controls.ctx.state.snapshot();
        assert_eq!(controls.restore(&loaded), 3);

        assert_eq!(controls.ctx.handles.ranges[0].range(), (0.2, 0.4));
        assert_eq!(controls.ctx.handles.spotlight.selected(), Some(0));
        // Snapshot existed, so the replayed saturation command is dropped.
        assert!(controls.ctx.queue.is_empty());
        assert!(!controls.ctx.state.is_suppressed());
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), before);
    }

    #[test]
    fn test_request_exit_sets_flag() {
        let dir = TempDir::new().unwrap();
        let (controls, _pipeline) =
            controls(ControlStateStore::empty(dir.path().join("state.json")));
        assert!(!controls.ctx.stop_requested());
        controls.request_exit();
        assert!(controls.ctx.stop_requested());
    }

    #[test]
    fn test_fresh_start_sends_max_saturation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let (controls, _pipeline) = controls(ControlStateStore::open(&path).unwrap());

        assert_eq!(controls.restore(&ControlState::new()), 0);

        let queued = controls.ctx.queue.drain();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].body.sat, Some(254));
        assert_eq!(queued[0].target, hueflow_control::Target::Group(3));
        // Defaults are not written back as operator choices.
        assert!(!path.exists());
        assert_eq!(controls.ctx.state.get("SAT_STATES[0]"), Some(ControlValue::Int(2)));
    }
}
