//! Adaptive sleep interval between runs.
//!
//! In `smart` mode the check frequency scales inversely with urgency: a
//! nearly exhausted plan is polled every minute, an abundant one roughly
//! hourly.

use rand::Rng;
use std::fmt;

/// Interval used by `fixed` mode when no usable value is configured.
pub const DEFAULT_FIXED_SECS: u64 = 90;

/// Band used by `random` mode and every unparsable mode.
pub const DEFAULT_RANDOM_BAND: (u64, u64) = (300, 500);

/// Interval once the volume is below the lowest tier.
pub const EXHAUSTED_SECS: u64 = 60;

/// Smart-mode tiers: (minimum GB, min seconds, max seconds), highest first.
const SMART_TIERS: &[(f64, u64, u64)] = &[
    (10.0, 3600, 5400),
    (5.0, 900, 1800),
    (3.0, 600, 900),
    (2.0, 300, 450),
    (1.2, 150, 240),
    (1.0, 60, 90),
];

/// How the next interval is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepMode {
    Smart,
    Fixed(u64),
    Random { min: u64, max: u64 },
}

impl SleepMode {
    /// Parse the configured mode. Never fails: anything unrecognized maps to
    /// the default random band.
    ///
    /// `interval` is only consulted for `fixed`.
    pub fn parse(mode: Option<&str>, interval: Option<&str>) -> Self {
        let mode = mode.map(|m| m.trim().to_ascii_lowercase()).unwrap_or_default();
        match mode.as_str() {
            "smart" => SleepMode::Smart,
            "fixed" => {
                let secs = interval
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .filter(|&v| v > 0)
                    .unwrap_or(DEFAULT_FIXED_SECS);
                SleepMode::Fixed(secs)
            }
            m if m.starts_with("random_") => parse_range(&m["random_".len()..])
                .map(|(min, max)| SleepMode::Random { min, max })
                .unwrap_or_else(default_random),
            _ => default_random(),
        }
    }
}

impl Default for SleepMode {
    fn default() -> Self {
        default_random()
    }
}

impl fmt::Display for SleepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SleepMode::Smart => write!(f, "smart"),
            SleepMode::Fixed(secs) => write!(f, "fixed({secs}s)"),
            SleepMode::Random { min, max } => write!(f, "random({min}-{max}s)"),
        }
    }
}

fn default_random() -> SleepMode {
    SleepMode::Random {
        min: DEFAULT_RANDOM_BAND.0,
        max: DEFAULT_RANDOM_BAND.1,
    }
}

/// `"<min>-<max>"` with `min < max`.
fn parse_range(range: &str) -> Option<(u64, u64)> {
    let (min, max) = range.split_once('-')?;
    let min = min.trim().parse::<u64>().ok()?;
    let max = max.trim().parse::<u64>().ok()?;
    (min < max).then_some((min, max))
}

/// Seconds to wait before the next run.
pub fn compute_interval<R: Rng + ?Sized>(last_quantity: f64, mode: &SleepMode, rng: &mut R) -> u64 {
    match *mode {
        SleepMode::Smart => smart_interval(last_quantity, rng),
        SleepMode::Fixed(secs) => secs,
        SleepMode::Random { min, max } => rng.gen_range(min..=max),
    }
}

/// Same as [`compute_interval`] with the thread-local RNG.
pub fn next_interval(last_quantity: f64, mode: &SleepMode) -> u64 {
    compute_interval(last_quantity, mode, &mut rand::thread_rng())
}

fn smart_interval<R: Rng + ?Sized>(last_quantity: f64, rng: &mut R) -> u64 {
    SMART_TIERS
        .iter()
        .find(|(floor, _, _)| last_quantity >= *floor)
        .map(|&(_, min, max)| rng.gen_range(min..=max))
        .unwrap_or(EXHAUSTED_SECS)
}
