//! Hue sweep
//!
//! Cycles every bridge's group 0 through a list of hues by enqueueing a
//! command every `length` seconds, even when the step has not changed. The
//! step index is derived from wall-clock time so restarts stay in phase.

use crate::commands::CommandQueue;
use crate::error::Result;
use crate::hue::{BridgeEndpoint, LightState};
use crate::request::DeviceRequest;
use crate::worker::WorkerOutcome;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Group addressed on every bridge (all lights)
pub const ALL_LIGHTS_GROUP: u32 = 0;

/// `floor(now / length) mod count`
pub fn step_index(now_secs: f64, length: f64, count: usize) -> usize {
    if count == 0 || length <= 0.0 {
        return 0;
    }
    ((now_secs / length).floor() as u64 % count as u64) as usize
}

pub struct Sweeper {
    endpoints: Vec<BridgeEndpoint>,
    values: Vec<u16>,
    length: f64,
    queue: CommandQueue,
    stop: Arc<AtomicBool>,
    check_interval: Duration,
}

impl Sweeper {
    pub fn new(
        endpoints: Vec<BridgeEndpoint>,
        values: Vec<u16>,
        length: f64,
        queue: CommandQueue,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            endpoints,
            values,
            length,
            queue,
            stop,
            check_interval: Duration::from_millis(100),
        }
    }

    /// Enqueue the hue for step `index` on every bridge
    pub fn enqueue_step(&self, index: usize) {
        let Some(hue) = self.values.get(index).copied() else {
            return;
        };
        let state = LightState::new().with_hue(hue).with_transition(self.length);
        for endpoint in &self.endpoints {
            self.queue
                .enqueue(DeviceRequest::group(endpoint, ALL_LIGHTS_GROUP, state));
        }
        debug!("Sweep step {} (hue {})", index, hue);
    }

    /// Longest sleep between checks of the stop flag
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    fn period(&self) -> Duration {
        Duration::try_from_secs_f64(self.length).unwrap_or(Duration::ZERO)
    }

    /// Sleep out the rest of the period. Returns `false` if stopped meanwhile.
    ///
    /// A deadline too far out to represent waits for the stop flag only.
    fn wait_until(&self, deadline: Option<Instant>) -> bool {
        loop {
            if self.stop.load(Ordering::Acquire) {
                return false;
            }
            let now = Instant::now();
            let remaining = match deadline {
                Some(deadline) if now >= deadline => return true,
                Some(deadline) => deadline - now,
                None => self.check_interval,
            };
            thread::sleep(remaining.min(self.check_interval));
        }
    }

    /// Enqueue the current step once per period until stopped
    pub fn run(&self) -> Result<WorkerOutcome> {
        let period = self.period();
        while !self.stop.load(Ordering::Acquire) {
            let started = Instant::now();
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs_f64();
            self.enqueue_step(step_index(now, self.length, self.values.len()));

            if !self.wait_until(started.checked_add(period)) {
                break;
            }
        }
        Ok(WorkerOutcome::Stopped)
    }
}
