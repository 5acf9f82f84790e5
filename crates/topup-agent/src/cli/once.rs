//! A single orchestrated run.

use super::run::{build_runner, notifier_for, prepare_data_dir};
use anyhow::{Context, Result};

pub async fn run() -> Result<()> {
    let config = topup_core::config::load().context("failed to load configuration")?;
    let last_quantity = prepare_data_dir(&config)?;

    let runner = build_runner(&config, notifier_for(&config))?;
    let outcome = runner.run_cycle(last_quantity).await;

    if !outcome.success {
        anyhow::bail!(
            "run failed: {}",
            outcome.error.unwrap_or_else(|| "unknown error".into())
        );
    }
    println!(
        "{:.2} GB remaining, next run in {} seconds",
        outcome.last_quantity, outcome.next_interval
    );
    Ok(())
}
