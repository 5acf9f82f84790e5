//! The polling loop.

use crate::browser::launcher_for;
use crate::telegram::TelegramNotifier;
use crate::update::{UpdateChecker, CURRENT_VERSION};
use anyhow::{Context, Result};
use std::sync::Arc;
use topup_core::notify::{messages, notify_best_effort, Notifier, NullNotifier};
use topup_core::storage::touch_start_marker;
use topup_core::{
    ActionTrigger, Config, CredentialStore, Runner, SessionManager, StateStore, PORTAL_LAYOUT,
};
use tracing::{info, warn};

/// Telegram when enabled, a no-op otherwise.
pub fn notifier_for(config: &Config) -> Arc<dyn Notifier> {
    match TelegramNotifier::from_settings(&config.notify) {
        Some(telegram) => Arc::new(telegram),
        None => {
            info!("notifications disabled");
            Arc::new(NullNotifier)
        }
    }
}

/// Wire the orchestrator from the configuration.
pub fn build_runner(config: &Config, notifier: Arc<dyn Notifier>) -> Result<Runner> {
    let launcher = launcher_for(config.browser, &config.user_agent)?;
    info!("using Chromium at {}", launcher.executable().display());

    let session = SessionManager::new(
        config.urls.clone(),
        config.credentials.clone(),
        CredentialStore::in_dir(&config.data_dir),
    );
    Ok(Runner::new(
        Box::new(launcher),
        session,
        StateStore::in_dir(&config.data_dir),
        notifier,
        config.sleep_mode,
    )
    .with_trigger(ActionTrigger::new(PORTAL_LAYOUT, config.top_up.clone())))
}

/// Create the data directory and return the last persisted quantity.
pub fn prepare_data_dir(config: &Config) -> Result<f64> {
    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("failed to create data directory {}", config.data_dir.display())
    })?;
    Ok(StateStore::in_dir(&config.data_dir)
        .load_or_reset()
        .last_quantity)
}

/// Remembers which release was already announced.
struct ReleaseWatch {
    checker: Option<UpdateChecker>,
    announced: Option<String>,
}

impl ReleaseWatch {
    fn new(config: &Config) -> Self {
        let checker = match (&config.update_url, config.auto_update) {
            (Some(url), true) => Some(UpdateChecker::new(url)),
            (None, true) => {
                info!("no update_url configured, skipping release checks");
                None
            }
            (_, false) => {
                info!("release checks disabled");
                None
            }
        };
        Self {
            checker,
            announced: None,
        }
    }

    async fn check(&mut self, notifier: &dyn Notifier) {
        let Some(checker) = &self.checker else {
            return;
        };
        match checker.newer_than(CURRENT_VERSION).await {
            Ok(Some(latest)) => {
                info!("new version available: {latest} (running {CURRENT_VERSION})");
                if self.announced.as_deref() != Some(latest.as_str()) {
                    notify_best_effort(
                        notifier,
                        &messages::update_available(CURRENT_VERSION, &latest),
                    )
                    .await;
                    self.announced = Some(latest);
                }
            }
            Ok(None) => info!("running the latest version"),
            Err(e) => warn!("release check failed: {e:#}"),
        }
    }
}

/// Poll until interrupted.
pub async fn run() -> Result<()> {
    let config = topup_core::config::load().context("failed to load configuration")?;
    let mut last_quantity = prepare_data_dir(&config)?;
    touch_start_marker(&config.data_dir).context("failed to write start marker")?;

    info!(
        "starting topup-agent v{CURRENT_VERSION} for {} (sleep mode {}, data in {})",
        config.credentials.identifier,
        config.sleep_mode,
        config.data_dir.display()
    );

    let notifier = notifier_for(&config);
    let runner = build_runner(&config, Arc::clone(&notifier))?;
    let mut releases = ReleaseWatch::new(&config);

    loop {
        releases.check(notifier.as_ref()).await;

        info!("starting run");
        let outcome = runner.run_cycle(last_quantity).await;
        last_quantity = outcome.last_quantity;

        info!("sleeping {} seconds", outcome.next_interval);
        tokio::select! {
            _ = tokio::time::sleep(outcome.next_delay()) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal");
                break;
            }
        }
    }

    Ok(())
}
