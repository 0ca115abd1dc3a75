//! Request outcome accounting
//!
//! Every worker counts into its own [`Results`] without synchronization and
//! merges into the shared [`GlobalResults`] once per iteration.

use parking_lot::Mutex;
use std::fmt;
use std::time::{Duration, Instant};

/// Success / failure counters owned by one worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Results {
    pub successes: u64,
    pub failures: u64,
    /// Set by [`Results::begin`]
    pub started: Option<Instant>,
    /// Set by [`Results::done`]
    pub finished: Option<Instant>,
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.successes += 1;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Total requests counted
    pub fn requests(&self) -> u64 {
        self.successes + self.failures
    }

    /// Add another set of counters; timestamps are left alone
    pub fn add(&mut self, other: &Results) {
        self.successes += other.successes;
        self.failures += other.failures;
    }

    /// Reset counters and timestamps
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn begin(&mut self) {
        self.started = Some(Instant::now());
        self.finished = None;
    }

    pub fn done(&mut self) {
        self.finished = Some(Instant::now());
    }

    /// Time between `begin` and `done` (or now, while running)
    pub fn elapsed(&self) -> Duration {
        match self.started {
            Some(start) => self.finished.unwrap_or_else(Instant::now).duration_since(start),
            None => Duration::ZERO,
        }
    }

    /// Throughput figures for this worker alone
    pub fn throughput(&self) -> Throughput {
        Throughput {
            elapsed: self.elapsed(),
            successes: self.successes,
            failures: self.failures,
        }
    }
}

#[derive(Debug, Default)]
struct Totals {
    counts: Results,
    started: Option<Instant>,
    finished: Option<Instant>,
}

/// Process-wide totals, safe to merge into from any thread
#[derive(Debug, Default)]
pub struct GlobalResults {
    inner: Mutex<Totals>,
}

impl GlobalResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a worker's counters. Concurrent merges never lose an update.
    pub fn add_from(&self, local: &Results) {
        self.inner.lock().counts.add(local);
    }

    /// Record the start timestamp
    pub fn begin(&self) {
        let mut totals = self.inner.lock();
        totals.started = Some(Instant::now());
        totals.finished = None;
    }

    /// Record the end timestamp
    pub fn done(&self) {
        self.inner.lock().finished = Some(Instant::now());
    }

    /// Merged counters so far
    pub fn totals(&self) -> Results {
        self.inner.lock().counts
    }

    /// Rates over the elapsed run time. Before `done()` the run is measured up to now.
    pub fn throughput(&self) -> Throughput {
        let totals = self.inner.lock();
        let elapsed = match totals.started {
            Some(start) => totals.finished.unwrap_or_else(Instant::now).duration_since(start),
            None => Duration::ZERO,
        };
        Throughput {
            elapsed,
            successes: totals.counts.successes,
            failures: totals.counts.failures,
        }
    }
}

/// Derived throughput figures for the final report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    pub elapsed: Duration,
    pub successes: u64,
    pub failures: u64,
}

impl Throughput {
    pub fn requests(&self) -> u64 {
        self.successes + self.failures
    }

    fn per_sec(&self, count: u64) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            count as f64 / secs
        } else {
            0.0
        }
    }

    pub fn requests_per_sec(&self) -> f64 {
        self.per_sec(self.requests())
    }

    pub fn success_per_sec(&self) -> f64 {
        self.per_sec(self.successes)
    }

    pub fn failure_per_sec(&self) -> f64 {
        self.per_sec(self.failures)
    }

    /// Failures as a percentage of all requests (0 when nothing was sent)
    pub fn failure_percent(&self) -> f64 {
        match self.requests() {
            0 => 0.0,
            total => self.failures as f64 / total as f64 * 100.0,
        }
    }
}

impl fmt::Display for Throughput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "* {:.2} seconds elapsed", self.elapsed.as_secs_f64())?;
        writeln!(
            f,
            "* {} requests ({:.2}/sec)",
            self.requests(),
            self.requests_per_sec()
        )?;
        writeln!(
            f,
            "* {} successful ({:.2}/sec)",
            self.successes,
            self.success_per_sec()
        )?;
        writeln!(
            f,
            "* {} failed ({:.2}/sec)",
            self.failures,
            self.failure_per_sec()
        )?;
        write!(f, "* {:.2}% failure rate", self.failure_percent())
    }
}
