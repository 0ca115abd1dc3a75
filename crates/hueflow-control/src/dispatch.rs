//! Dispatch worker
//!
//! One per worker group of a cluster. Every iteration reads the latest
//! values for its fixtures, builds one request per fixture, pushes the batch
//! through the executor with this cluster's connection budget, and merges its
//! counters into the global results.

use crate::batch::BatchExecutor;
use crate::error::{ControlError, Result};
use crate::history::{Recording, RequestHistory};
use crate::hue::{brightness, BridgeEndpoint, LightState};
use crate::request::DeviceRequest;
use crate::worker::WorkerOutcome;
use hueflow_core::config::Look;
use hueflow_core::{BridgeSettings, FixtureGroup, FixtureId, GlobalResults, Results, SharedOutput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// Random benchmark look: quantized hue for color lights, brightness otherwise
#[derive(Debug, Clone)]
pub struct RandomLook {
    hue_positions: u32,
    bri_positions: u32,
    min_bri: u8,
    max_bri: u8,
    color: HashSet<FixtureId>,
}

impl RandomLook {
    pub fn new(
        hue_positions: u32,
        bri_positions: u32,
        min_bri: u8,
        max_bri: u8,
        color: impl IntoIterator<Item = FixtureId>,
    ) -> Self {
        Self {
            hue_positions: hue_positions.max(1),
            bri_positions: bri_positions.max(1),
            min_bri: min_bri.min(max_bri),
            max_bri,
            color: color.into_iter().collect(),
        }
    }

    /// Build from a `Look::Random` section and the bridge's fixture lists
    pub fn from_look(look: &Look, bridge: &BridgeSettings) -> Option<Self> {
        match look {
            Look::Random {
                hue_positions,
                bri_positions,
                min_bri,
                max_bri,
            } => Some(Self::new(
                *hue_positions,
                *bri_positions,
                *min_bri,
                *max_bri,
                bridge.color.iter().copied(),
            )),
            Look::Pipeline => None,
        }
    }

    pub fn is_color(&self, fixture: FixtureId) -> bool {
        self.color.contains(&fixture)
    }

    /// One of `hue_positions` evenly spaced hues
    pub fn random_hue(&self, rng: &mut impl Rng) -> u16 {
        let step = 65_536 / self.hue_positions;
        let hue = rng.gen_range(0..self.hue_positions) * step;
        hue.min(u16::MAX as u32) as u16
    }

    /// Random brightness in `[min_bri, max_bri]`, rounded to a multiple of `bri_positions`
    pub fn random_bri(&self, rng: &mut impl Rng) -> u8 {
        let raw = rng.gen_range(self.min_bri as u32..=self.max_bri as u32);
        let step = self.bri_positions as f64;
        let quantized = (raw as f64 / step).round() * step;
        quantized.clamp(0.0, u8::MAX as f64) as u8
    }

    pub fn state_for(&self, fixture: FixtureId, rng: &mut impl Rng) -> LightState {
        if self.is_color(fixture) {
            LightState::new().with_hue(self.random_hue(rng))
        } else {
            LightState::new().with_bri(self.random_bri(rng))
        }
    }
}

/// Where a dispatch worker takes its values from
#[derive(Debug, Clone)]
pub enum ValueSource {
    /// Brightness from the published pipeline output
    Pipeline(SharedOutput),
    Random(RandomLook),
}

/// Settings shared by every dispatch worker
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Concurrent requests per batch
    pub max_connects: usize,
    /// Iterations to run; 0 runs until stopped
    pub iterations: u64,
    /// Transition attached to every update, in seconds
    pub transition: f64,
}

pub struct DispatchWorker {
    name: String,
    endpoint: BridgeEndpoint,
    group: FixtureGroup,
    source: ValueSource,
    settings: DispatchSettings,
    executor: Arc<dyn BatchExecutor>,
    results: Arc<GlobalResults>,
    stop: Arc<AtomicBool>,
    history: Option<Arc<RequestHistory>>,
}

impl DispatchWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        endpoint: BridgeEndpoint,
        group: FixtureGroup,
        source: ValueSource,
        settings: DispatchSettings,
        executor: Arc<dyn BatchExecutor>,
        results: Arc<GlobalResults>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint,
            group,
            source,
            settings,
            executor,
            results,
            stop,
            history: None,
        }
    }

    /// Log every completed request into `history`
    pub fn with_history(mut self, history: Arc<RequestHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &FixtureGroup {
        &self.group
    }

    /// Requests for the current values, one per fixture
    pub fn build_batch(&self, rng: &mut impl Rng, batch: &mut Vec<DeviceRequest>) -> Result<()> {
        batch.clear();
        for (index, fixture) in self.group.members() {
            let state = match &self.source {
                ValueSource::Pipeline(output) => {
                    let value = output.get(index).ok_or_else(|| {
                        ControlError::Runtime(format!(
                            "Fixture index {} outside pipeline output ({} slots)",
                            index,
                            output.len()
                        ))
                    })?;
                    LightState::new().with_bri(brightness(value))
                }
                ValueSource::Random(look) => look.state_for(fixture, rng),
            };
            let state = state.with_transition(self.settings.transition);
            batch.push(DeviceRequest::light(&self.endpoint, fixture, state));
        }
        Ok(())
    }

    /// Run one iteration; returns this iteration's counters after merging them.
    pub fn iterate(&self, rng: &mut impl Rng, batch: &mut Vec<DeviceRequest>) -> Result<Results> {
        let mut local = Results::new();
        self.build_batch(rng, batch)?;
        let max_connects = self.settings.max_connects;
        match &self.history {
            Some(history) => {
                let mut handler = Recording::new(&mut local, history);
                self.executor.execute(batch, max_connects, &mut handler)?
            }
            None => self.executor.execute(batch, max_connects, &mut local)?,
        }
        self.results.add_from(&local);
        Ok(local)
    }

    /// Iterate until the configured count is reached or the stop flag is set.
    pub fn run(&self, start: Instant) -> Result<WorkerOutcome> {
        debug!(
            worker = %self.name,
            cluster = %self.endpoint.name,
            "Dispatching {} lights, {} connections",
            self.group.len(),
            self.settings.max_connects
        );
        let mut rng = StdRng::from_entropy();
        let mut batch = Vec::with_capacity(self.group.len());
        let mut iteration = 0u64;
        let mut totals = Results::new();
        totals.begin();

        let outcome = loop {
            if self.stop.load(Ordering::Acquire) {
                break WorkerOutcome::Stopped;
            }
            if self.settings.iterations > 0 && iteration >= self.settings.iterations {
                break WorkerOutcome::Completed;
            }

            let counts = self.iterate(&mut rng, &mut batch)?;
            totals.add(&counts);
            iteration += 1;
            trace!(
                worker = %self.name,
                "Iteration {} at +{:.3}s: {} ok, {} failed",
                iteration,
                start.elapsed().as_secs_f64(),
                counts.successes,
                counts.failures
            );
        };

        totals.done();
        let throughput = totals.throughput();
        debug!(
            worker = %self.name,
            "{} iterations, {} requests in {:.2}s ({:.2}/sec, {:.2}% failed)",
            iteration,
            throughput.requests(),
            throughput.elapsed.as_secs_f64(),
            throughput.requests_per_sec(),
            throughput.failure_percent()
        );
        Ok(outcome)
    }
}
