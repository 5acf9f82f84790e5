//! Black-box checks of the library surface used by the agent binary.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use topup_core::config;
use topup_core::health::{self, Health};
use topup_core::{compute_interval, parse_volume, ConfigSource, PersistedState, SleepMode, StateStore};

use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn smart_mode_bounds_for_documented_quantities() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..500 {
        let secs = compute_interval(12.0, &SleepMode::Smart, &mut rng);
        assert!((3600..=5400).contains(&secs));
    }
    assert_eq!(compute_interval(0.5, &SleepMode::Smart, &mut rng), 60);
}

#[test]
fn configured_modes_fall_back() {
    let mut rng = StdRng::seed_from_u64(1);
    let fixed = SleepMode::parse(Some("fixed"), Some("abc"));
    assert_eq!(compute_interval(4.0, &fixed, &mut rng), 90);

    let inverted = SleepMode::parse(Some("random_100-50"), None);
    for _ in 0..200 {
        let secs = compute_interval(4.0, &inverted, &mut rng);
        assert!((300..=500).contains(&secs));
    }
}

#[test]
fn volume_parsing() {
    assert_eq!(parse_volume("512 MB").unwrap(), 0.5);
    assert_eq!(parse_volume("2,5 GB").unwrap(), 2.5);
    assert!(parse_volume("keine Angabe").is_err());
}

#[test]
fn state_file_roundtrip_and_reset() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::in_dir(dir.path());

    std::fs::write(store.path(), r#"{"last_gb": 3.2}"#).unwrap();
    assert_eq!(store.load().last_quantity, 3.2);

    store.save(&PersistedState::new(7.25)).unwrap();
    assert_eq!(store.load().last_quantity, 7.25);

    std::fs::write(store.path(), "\u{0}\u{1}").unwrap();
    assert_eq!(store.load().last_quantity, 0.0);
}

#[test]
fn health_probe_thresholds() {
    let now = SystemTime::now();
    let ten_minutes = now - Duration::from_secs(10 * 60);
    let three_hours = now - Duration::from_secs(3 * 60 * 60);

    assert!(health::evaluate(Some(ten_minutes), None, now).is_healthy());
    assert!(!health::evaluate(Some(three_hours), None, now).is_healthy());
    assert_eq!(health::evaluate(None, None, now), Health::Missing);
}

#[test]
fn health_check_reads_data_dir() {
    let dir = TempDir::new().unwrap();
    assert_eq!(health::check(dir.path()).exit_code(), 1);

    StateStore::in_dir(dir.path())
        .save(&PersistedState::new(1.0))
        .unwrap();
    assert_eq!(health::check(dir.path()).exit_code(), 0);
}

#[test]
fn config_from_secrets_directory() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("topup_identifier"), "01701234567").unwrap();
    std::fs::write(dir.path().join("topup_secret"), "pw").unwrap();
    std::fs::write(dir.path().join("topup_sleep_mode"), "smart").unwrap();
    std::fs::write(dir.path().join("topup_topup_label"), "2 GB").unwrap();

    let env: HashMap<&str, String> = HashMap::from([
        ("TOPUP_SECRETS_DIR", dir.path().display().to_string()),
        ("TOPUP_DATA_DIR", dir.path().join("data").display().to_string()),
    ]);
    let config = config::load_with(|key| env.get(key).cloned()).unwrap();

    assert_eq!(config.source, ConfigSource::Secrets(dir.path().to_path_buf()));
    assert_eq!(config.sleep_mode, SleepMode::Smart);
    assert_eq!(config.top_up.label, "2 GB");
    assert_eq!(config.data_dir, dir.path().join("data"));
}
