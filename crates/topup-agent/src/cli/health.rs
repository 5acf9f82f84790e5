//! Container health probe.

use chrono::{DateTime, Local, TimeDelta};
use std::path::PathBuf;
use std::time::Duration;
use topup_core::health::{self, Health};

/// Data directory to probe: flag, then `TOPUP_DATA_DIR`, then the configured one.
fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }
    if let Some(dir) = std::env::var("TOPUP_DATA_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
    {
        return PathBuf::from(dir);
    }
    match topup_core::config::load() {
        Ok(config) => config.data_dir,
        Err(_) => topup_core::config::default_data_dir(),
    }
}

fn timestamp(age: Duration) -> String {
    TimeDelta::from_std(age)
        .map(|delta| Local::now() - delta)
        .map(|t: DateTime<Local>| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Human-readable verdict.
pub fn describe(health: &Health) -> String {
    match health {
        Health::Fresh { age } => format!("healthy: state updated {}", timestamp(*age)),
        Health::Starting { since_start } => format!(
            "healthy: starting up ({}s ago), no state yet",
            since_start.as_secs()
        ),
        Health::Stale { age } => format!("unhealthy: state last updated {}", timestamp(*age)),
        Health::Missing => "unhealthy: no state file and no recent start".to_string(),
    }
}

/// Probe and return the process exit code.
pub fn run(data_dir: Option<PathBuf>) -> i32 {
    let data_dir = resolve_data_dir(data_dir);
    let health = health::check(&data_dir);
    println!("{}", describe(&health));
    health.exit_code()
}
