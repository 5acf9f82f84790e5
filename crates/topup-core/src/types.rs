//! Data model and error types shared across the agent.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which of the two mutually exclusive plan displays the dashboard shows.
///
/// The plus plan renders its domestic/EU meter in a second usage-meter stack,
/// so every selector lookup is keyed by this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Standard,
    Plus,
}

impl Plan {
    /// The boolean category flag as reported by the extractor.
    pub fn is_plus(self) -> bool {
        matches!(self, Plan::Plus)
    }

    pub fn from_flag(flag: bool) -> Self {
        if flag {
            Plan::Plus
        } else {
            Plan::Standard
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Standard => "standard",
            Plan::Plus => "plus",
        }
    }
}

/// A single reading of the remaining data volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Remaining volume in GB.
    pub quantity: f64,
    pub plan: Plan,
}

impl Measurement {
    pub fn new(quantity: f64, plan: Plan) -> Self {
        Self { quantity, plan }
    }

    pub fn category_flag(&self) -> bool {
        self.plan.is_plus()
    }
}

/// Durable scheduling input, stored as `{"last_gb": <float>}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(rename = "last_gb")]
    pub last_quantity: f64,
}

impl PersistedState {
    /// Build a state, clamping anything that is not a finite non-negative number to zero.
    pub fn new(last_quantity: f64) -> Self {
        if last_quantity.is_finite() && last_quantity >= 0.0 {
            Self { last_quantity }
        } else {
            Self::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.last_quantity.is_finite() && self.last_quantity >= 0.0
    }
}

impl Default for PersistedState {
    fn default() -> Self {
        Self { last_quantity: 0.0 }
    }
}

/// Result of one orchestrated run (up to three attempts).
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub success: bool,
    /// Seconds to sleep before the next run.
    pub next_interval: u64,
    pub error: Option<String>,
    /// The quantity to carry into the next run.
    pub last_quantity: f64,
}

impl RunOutcome {
    pub fn next_delay(&self) -> Duration {
        Duration::from_secs(self.next_interval)
    }
}

/// How the top-up control was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopUpPath {
    /// Plan-specific action selector with a matching label.
    Structured,
    /// Unfiltered scan over every action control on the page.
    BroadScan,
}

/// Decision taken by the action trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopUp {
    NotNeeded,
    Performed(TopUpPath),
}

/// Errors raised by a page driver.
#[derive(thiserror::Error, Debug)]
pub enum PageError {
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Interaction failed on {selector}: {reason}")]
    Interaction { selector: String, reason: String },

    #[error("Browser error: {0}")]
    Browser(String),
}

/// Errors that abort a single attempt of the cycle.
#[derive(thiserror::Error, Debug)]
pub enum CycleError {
    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("No top-up control found (remaining {quantity:.2} GB)")]
    ActionNotFound { quantity: f64 },

    #[error("Timed out waiting for {what} after {attempts} attempts")]
    Timeout { what: String, attempts: u32 },

    #[error("Page error: {0}")]
    Page(#[from] PageError),

    #[error("Browser launch failed: {0}")]
    Browser(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Errors from the state and session files.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from notification delivery.
#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    #[error("Delivery failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("Notifier misconfigured: {0}")]
    Misconfigured(String),
}

/// Errors from configuration loading.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("No configuration found: set TOPUP_IDENTIFIER/TOPUP_SECRET, provide secrets in {secrets_dir}, or create {config_file}")]
    Missing {
        secrets_dir: String,
        config_file: String,
    },

    #[error("Cannot read config file {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Convenience result type for a cycle step.
pub type CycleResult<T> = Result<T, CycleError>;
