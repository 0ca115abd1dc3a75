//! Request history
//!
//! Every completed request, in completion order, kept for a JSON dump at
//! shutdown. Wrap a worker's handler in [`Recording`] to feed it.

use crate::batch::ResponseHandler;
use crate::error::{ControlError, Result};
use crate::hue::LightState;
use crate::request::DeviceRequest;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::warn;

/// One completed request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestRecord {
    /// Seconds since the history was created
    pub at: f64,
    pub cluster: String,
    pub target: String,
    pub body: LightState,
    /// HTTP status on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Shared, bounded request log
#[derive(Debug)]
pub struct RequestHistory {
    epoch: Instant,
    limit: usize,
    records: Mutex<Vec<RequestRecord>>,
    dropped: AtomicU64,
}

impl RequestHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            epoch: Instant::now(),
            limit,
            records: Mutex::new(Vec::new()),
            dropped: AtomicU64::new(0),
        }
    }

    fn push(&self, request: &DeviceRequest, status: Option<u16>, error: Option<String>) {
        let record = RequestRecord {
            at: self.epoch.elapsed().as_secs_f64(),
            cluster: request.cluster.clone(),
            target: request.target.to_string(),
            body: request.body,
            status,
            error,
        };

        let mut records = self.records.lock();
        if records.len() < self.limit {
            records.push(record);
        } else if self.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
            warn!("Request history reached {} records, no longer recording", self.limit);
        }
    }

    pub fn record_success(&self, request: &DeviceRequest, status: u16) {
        self.push(request, Some(status), None);
    }

    pub fn record_failure(&self, request: &DeviceRequest, error: &ControlError) {
        self.push(request, None, Some(error.to_string()));
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Requests completed after the limit was reached
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn records(&self) -> Vec<RequestRecord> {
        self.records.lock().clone()
    }

    /// Write the history as JSON lines, one request per line
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let records = self.records.lock();
        let mut out = Vec::new();
        for record in records.iter() {
            serde_json::to_writer(&mut out, record)?;
            out.push(b'\n');
        }
        fs::write(path, out)?;
        Ok(())
    }
}

/// Forwards completions to `inner` and logs them into a [`RequestHistory`]
pub struct Recording<'a> {
    inner: &'a mut dyn ResponseHandler,
    history: &'a RequestHistory,
}

impl<'a> Recording<'a> {
    pub fn new(inner: &'a mut dyn ResponseHandler, history: &'a RequestHistory) -> Self {
        Self { inner, history }
    }
}

impl ResponseHandler for Recording<'_> {
    fn on_success(&mut self, request: &DeviceRequest, status: u16) {
        self.history.record_success(request, status);
        self.inner.on_success(request, status);
    }

    fn on_failure(&mut self, request: &DeviceRequest, error: &ControlError) {
        self.history.record_failure(request, error);
        self.inner.on_failure(request, error);
    }
}
