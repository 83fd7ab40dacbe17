//! Health flag: a two-state file that only changes when the fleet's state flips.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    Failed,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Ok => "OK",
            HealthStatus::Failed => "FAILED",
        }
    }
}

/// Last persisted status. Starts at `Ok`.
#[derive(Debug)]
pub struct HealthState {
    current: HealthStatus,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            current: HealthStatus::Ok,
        }
    }

    pub fn current(&self) -> HealthStatus {
        self.current
    }

    /// Feeds one cycle's result. Returns the new status only on a transition.
    pub fn observe(&mut self, cycle_failed: bool) -> Option<HealthStatus> {
        let next = if cycle_failed {
            HealthStatus::Failed
        } else {
            HealthStatus::Ok
        };
        if next == self.current {
            return None;
        }
        self.current = next;
        Some(next)
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct HealthFile {
    path: PathBuf,
}

impl HealthFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, status: HealthStatus) -> io::Result<()> {
        fs::write(&self.path, status.as_str())
    }
}
