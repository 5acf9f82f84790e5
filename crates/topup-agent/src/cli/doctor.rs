//! Environment readiness check.

use crate::browser::chromium::{find_chromium, total_memory_bytes};
use anyhow::Result;
use std::path::Path;
use topup_core::config;

const MIB: u64 = 1024 * 1024;

/// Check Chromium, the data directory, memory and configuration.
pub async fn run() -> Result<()> {
    println!("topup-agent Doctor");
    println!("==================");
    println!();

    println!("OS:      {}", std::env::consts::OS);
    println!("Arch:    {}", std::env::consts::ARCH);
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    let chromium = find_chromium();
    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!("[!!] Chromium NOT found. Install it or set TOPUP_CHROMIUM_PATH."),
    }

    match total_memory_bytes() {
        Some(bytes) if bytes <= 2 * 1024 * MIB => println!(
            "[OK] Total memory: {}MB (low-memory Chromium flags will be used)",
            bytes / MIB
        ),
        Some(bytes) => println!("[OK] Total memory: {}MB", bytes / MIB),
        None => println!("[??] Could not determine total memory"),
    }

    let source = config::probe_source_with(|key| std::env::var(key).ok());
    match &source {
        Ok(source) => println!("[OK] Configuration: {source}"),
        Err(e) => println!("[!!] Configuration: {e}"),
    }

    let data_dir = match config::load() {
        Ok(config) => config.data_dir,
        Err(_) => config::default_data_dir(),
    };
    let writable = check_writable(&data_dir);
    if writable {
        println!("[OK] Data directory {} is writable", data_dir.display());
    } else {
        println!("[!!] Data directory {} is not writable", data_dir.display());
    }

    println!();
    if chromium.is_some() && source.is_ok() && writable {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}

fn check_writable(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }
    let probe = dir.join(".doctor-probe");
    let ok = std::fs::write(&probe, b"ok").is_ok();
    let _ = std::fs::remove_file(&probe);
    ok
}
