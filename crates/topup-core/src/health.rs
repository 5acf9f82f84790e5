//! Liveness probe based on how fresh the state file is.
//!
//! The agent rewrites `state.json` after every successful reading. The
//! longest smart-mode sleep is 90 minutes, so a file older than two hours
//! means the loop is stuck.

use crate::storage::{START_MARKER_FILE, STATE_FILE};
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Maximum age of the state file.
pub const MAX_STATE_AGE: Duration = Duration::from_secs(2 * 60 * 60);

/// Grace period after start during which a missing state file is fine.
pub const STARTUP_GRACE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    /// State written `age` ago.
    Fresh { age: Duration },
    /// No state yet, still inside the startup grace window.
    Starting { since_start: Duration },
    Stale { age: Duration },
    /// No state file and no recent start.
    Missing,
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Health::Fresh { .. } | Health::Starting { .. })
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_healthy() {
            0
        } else {
            1
        }
    }
}

/// Decide health from the state file's and start marker's modification times.
pub fn evaluate(state_modified: Option<SystemTime>, started: Option<SystemTime>, now: SystemTime) -> Health {
    let age_of = |t: SystemTime| now.duration_since(t).unwrap_or(Duration::ZERO);

    if let Some(modified) = state_modified {
        let age = age_of(modified);
        return if age < MAX_STATE_AGE {
            Health::Fresh { age }
        } else {
            Health::Stale { age }
        };
    }

    match started.map(age_of) {
        Some(since_start) if since_start < STARTUP_GRACE => Health::Starting { since_start },
        _ => Health::Missing,
    }
}

/// Probe the files in `data_dir`.
pub fn check(data_dir: &Path) -> Health {
    let mtime = |name: &str| {
        std::fs::metadata(data_dir.join(name))
            .and_then(|m| m.modified())
            .ok()
    };
    evaluate(mtime(STATE_FILE), mtime(START_MARKER_FILE), SystemTime::now())
}
