//! Out-of-band command queue
//!
//! Operator actions enqueue requests from any thread. A single
//! [`CommandWorker`] waits up to one poll interval for work, then drains
//! everything queued into one batch.

use crate::batch::BatchExecutor;
use crate::error::Result;
use crate::history::{Recording, RequestHistory};
use crate::request::DeviceRequest;
use crate::worker::WorkerOutcome;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use hueflow_core::Results;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Multi-producer, single-consumer command queue
#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: Sender<DeviceRequest>,
    rx: Receiver<DeviceRequest>,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Add a command. Arrival order is preserved.
    pub fn enqueue(&self, request: DeviceRequest) {
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.tx.send(request);
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Take everything currently queued
    pub fn drain(&self) -> Vec<DeviceRequest> {
        self.rx.try_iter().collect()
    }

    /// Drop everything currently queued; returns how many were dropped
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// Wait up to `timeout` for the next batch
    pub fn next_batch(&self, timeout: Duration) -> Option<Vec<DeviceRequest>> {
        match self.rx.recv_timeout(timeout) {
            Ok(first) => {
                let mut batch = vec![first];
                batch.extend(self.rx.try_iter());
                Some(batch)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// Flushes the command queue in periodic batches
pub struct CommandWorker {
    queue: CommandQueue,
    executor: Arc<dyn BatchExecutor>,
    max_connects: usize,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
    history: Option<Arc<RequestHistory>>,
}

impl CommandWorker {
    pub fn new(
        queue: CommandQueue,
        executor: Arc<dyn BatchExecutor>,
        max_connects: usize,
        poll_interval: Duration,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            queue,
            executor,
            max_connects,
            poll_interval,
            stop,
            history: None,
        }
    }

    /// Log every flushed command into `history`
    pub fn with_history(mut self, history: Arc<RequestHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Flush one batch if anything arrives within a poll interval
    pub fn flush_once(&self, totals: &mut Results) -> Result<usize> {
        let Some(batch) = self.queue.next_batch(self.poll_interval) else {
            return Ok(0);
        };
        let mut local = Results::new();
        match &self.history {
            Some(history) => {
                let mut handler = Recording::new(&mut local, history);
                self.executor.execute(&batch, self.max_connects, &mut handler)?
            }
            None => self.executor.execute(&batch, self.max_connects, &mut local)?,
        }
        debug!(
            "Flushed {} commands ({} ok, {} failed)",
            batch.len(),
            local.successes,
            local.failures
        );
        totals.add(&local);
        Ok(batch.len())
    }

    pub fn run(&self) -> Result<WorkerOutcome> {
        let mut totals = Results::new();
        totals.begin();
        while !self.stop.load(Ordering::Acquire) {
            self.flush_once(&mut totals)?;
        }
        totals.done();
        info!(
            "Command worker sent {} commands ({} failed) in {:.2}s",
            totals.requests(),
            totals.failures,
            totals.elapsed().as_secs_f64()
        );
        Ok(WorkerOutcome::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::NullExecutor;
    use crate::hue::{BridgeEndpoint, LightState};

    fn command(group: u32) -> DeviceRequest {
        let endpoint = BridgeEndpoint::new("Bridge-01", "10.0.0.2", "user");
        DeviceRequest::group(&endpoint, group, LightState::new().with_sat(group as u8))
    }

    #[test]
    fn test_fifo_drain() {
        let queue = CommandQueue::new();
        for group in 0..4 {
            queue.enqueue(command(group));
        }
        assert_eq!(queue.len(), 4);
        let drained = queue.drain();
        let groups: Vec<_> = drained.iter().map(|r| r.url.clone()).collect();
        assert_eq!(groups[0], command(0).url);
        assert_eq!(groups[3], command(3).url);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clear() {
        let queue = CommandQueue::new();
        queue.enqueue(command(1));
        queue.enqueue(command(2));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_empty_poll_returns_none() {
        let queue = CommandQueue::new();
        assert!(queue.next_batch(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn test_flush_drains_whole_queue() {
        let queue = CommandQueue::new();
        let worker = CommandWorker::new(
            queue.clone(),
            Arc::new(NullExecutor),
            1,
            Duration::from_millis(10),
            Arc::new(AtomicBool::new(false)),
        );
        for group in 0..3 {
            queue.enqueue(command(group));
        }
        let mut totals = Results::new();
        assert_eq!(worker.flush_once(&mut totals).unwrap(), 3);
        assert_eq!(totals.successes, 3);
        assert_eq!(worker.flush_once(&mut totals).unwrap(), 0);
    }
}
