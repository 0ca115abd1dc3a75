//! Persisted operator control state
//!
//! A small `key -> scalar | absent` map, rewritten as a whole JSON snapshot on
//! every accepted change so a restart resumes the previous look.

use crate::error::{CoreError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// A persisted scalar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ControlValue {
    /// Integer view (floats are truncated)
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ControlValue::Int(v) => Some(*v),
            ControlValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Index view, for selector positions
    pub fn as_index(&self) -> Option<usize> {
        self.as_int().and_then(|v| usize::try_from(v).ok())
    }

    /// JSON has no NaN or infinity; such floats would reload as absent.
    pub fn is_persistable(&self) -> bool {
        match self {
            ControlValue::Float(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl From<i64> for ControlValue {
    fn from(v: i64) -> Self {
        ControlValue::Int(v)
    }
}

impl From<usize> for ControlValue {
    fn from(v: usize) -> Self {
        ControlValue::Int(v as i64)
    }
}

impl From<f64> for ControlValue {
    fn from(v: f64) -> Self {
        ControlValue::Float(v)
    }
}

impl From<bool> for ControlValue {
    fn from(v: bool) -> Self {
        ControlValue::Bool(v)
    }
}

impl From<&str> for ControlValue {
    fn from(v: &str) -> Self {
        ControlValue::Text(v.to_string())
    }
}

/// The whole snapshot. `None` records an explicitly absent value.
pub type ControlState = BTreeMap<String, Option<ControlValue>>;

/// Read a snapshot file; a missing file is an empty state.
pub fn load(path: &Path) -> Result<ControlState> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(ControlState::new()),
        Err(e) => Err(e.into()),
    }
}

/// Write a snapshot atomically: temp file in the same directory, then rename.
pub fn save(path: &Path, state: &ControlState) -> Result<()> {
    let persistence = |source: std::io::Error| CoreError::StatePersistence {
        path: path.display().to_string(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(persistence)?;

    let content = serde_json::to_string_pretty(state)?;
    let mut file = tempfile::NamedTempFile::new_in(&dir).map_err(persistence)?;
    file.write_all(content.as_bytes()).map_err(persistence)?;
    file.write_all(b"\n").map_err(persistence)?;
    file.persist(path).map_err(|e| persistence(e.error))?;
    Ok(())
}

/// In-memory control state plus its snapshot file
#[derive(Debug)]
pub struct ControlStateStore {
    path: PathBuf,
    state: Mutex<ControlState>,
    suppressed: AtomicBool,
    restored: bool,
}

impl ControlStateStore {
    /// Load the snapshot at `path` if there is one
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let restored = path.exists();
        let state = load(&path)?;
        Ok(Self {
            path,
            state: Mutex::new(state),
            suppressed: AtomicBool::new(false),
            restored,
        })
    }

    /// Start from an empty state, ignoring any existing snapshot
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(ControlState::new()),
            suppressed: AtomicBool::new(false),
            restored: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a snapshot file existed when the store was opened
    pub fn restored(&self) -> bool {
        self.restored
    }

    pub fn get(&self, key: &str) -> Option<ControlValue> {
        self.state.lock().get(key).cloned().flatten()
    }

    /// Copy of the whole in-memory state
    pub fn snapshot(&self) -> ControlState {
        self.state.lock().clone()
    }

    /// Record `key = value`.
    ///
    /// Returns `false` (and writes nothing) when the value is unchanged or is
    /// a non-finite float; a missing key counts as absent. Otherwise the whole
    /// snapshot is rewritten unless persistence is suppressed. Write failures
    /// are logged and ignored.
    pub fn update(&self, key: &str, value: Option<ControlValue>) -> bool {
        if let Some(rejected) = value.as_ref().filter(|v| !v.is_persistable()) {
            warn!("Ignoring non-finite control value {:?} for '{}'", rejected, key);
            return false;
        }

        let mut state = self.state.lock();
        let current = state.get(key).cloned().flatten();
        if current == value {
            return false;
        }
        state.insert(key.to_string(), value);

        if self.suppressed.load(Ordering::Acquire) {
            return true;
        }

        debug!("Persisting control state.");
        if let Err(e) = save(&self.path, &state) {
            warn!("Control state not saved: {}", e);
        }
        true
    }

    /// Suppress persistence until the returned guard is dropped.
    ///
    /// Used while a restored snapshot is replayed into the stage setters.
    pub fn suppress(&self) -> SuppressGuard<'_> {
        self.suppressed.store(true, Ordering::Release);
        SuppressGuard { store: self }
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::Acquire)
    }
}

/// Re-enables persistence on drop
#[must_use = "persistence is re-enabled as soon as the guard is dropped"]
pub struct SuppressGuard<'a> {
    store: &'a ControlStateStore,
}

impl Drop for SuppressGuard<'_> {
    fn drop(&mut self) {
        self.store.suppressed.store(false, Ordering::Release);
    }
}
