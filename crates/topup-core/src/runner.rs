//! One orchestrated run: up to three attempts of the full cycle.

use crate::action::ActionTrigger;
use crate::extract::Extractor;
use crate::notify::{messages, notify_best_effort, Notifier};
use crate::page::{Launcher, PortalPage};
use crate::scheduler::{next_interval, SleepMode};
use crate::session::SessionManager;
use crate::storage::StateStore;
use crate::types::{CycleError, CycleResult, PersistedState, RunOutcome, TopUp, TopUpPath};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_PAUSE: Duration = Duration::from_secs(2);

/// What a successful attempt observed.
#[derive(Debug, Clone, Copy)]
struct Observation {
    quantity: f64,
    interval: u64,
}

/// Drives session, extraction, persistence and top-up for one run.
pub struct Runner {
    launcher: Box<dyn Launcher>,
    session: SessionManager,
    extractor: Extractor,
    trigger: ActionTrigger,
    state: StateStore,
    notifier: Arc<dyn Notifier>,
    sleep_mode: SleepMode,
    attempts: u32,
    retry_pause: Duration,
}

impl Runner {
    pub fn new(
        launcher: Box<dyn Launcher>,
        session: SessionManager,
        state: StateStore,
        notifier: Arc<dyn Notifier>,
        sleep_mode: SleepMode,
    ) -> Self {
        Self {
            launcher,
            session,
            extractor: Extractor::default(),
            trigger: ActionTrigger::default(),
            state,
            notifier,
            sleep_mode,
            attempts: DEFAULT_ATTEMPTS,
            retry_pause: DEFAULT_RETRY_PAUSE,
        }
    }

    pub fn with_trigger(mut self, trigger: ActionTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Override the attempt budget and the pause between attempts.
    pub fn with_attempts(mut self, attempts: u32, retry_pause: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.retry_pause = retry_pause;
        self
    }

    /// Run the cycle, retrying failed attempts. Never fails: when every
    /// attempt errors, the interval is derived from the latest quantity read
    /// during this run, or `last_quantity` if nothing was read.
    pub async fn run_cycle(&self, last_quantity: f64) -> RunOutcome {
        let identifier = self.session.identifier();
        let mut latest = last_quantity;
        let mut last_error = None;

        for attempt in 1..=self.attempts {
            tracing::info!("starting attempt {attempt}/{}", self.attempts);
            match self.attempt(&mut latest).await {
                Ok(observed) => {
                    tracing::info!(
                        quantity = observed.quantity,
                        next_interval = observed.interval,
                        "run completed"
                    );
                    return RunOutcome {
                        success: true,
                        next_interval: observed.interval,
                        error: None,
                        last_quantity: observed.quantity,
                    };
                }
                Err(e) => {
                    tracing::error!("attempt {attempt} failed: {e}");
                    notify_best_effort(
                        self.notifier.as_ref(),
                        &messages::failed(identifier, &e.to_string()),
                    )
                    .await;
                    last_error = Some(e.to_string());
                    if attempt < self.attempts && !self.retry_pause.is_zero() {
                        tokio::time::sleep(self.retry_pause).await;
                    }
                }
            }
        }

        tracing::error!("all {} attempts failed", self.attempts);
        notify_best_effort(
            self.notifier.as_ref(),
            &messages::gave_up(identifier, self.attempts),
        )
        .await;

        RunOutcome {
            success: false,
            next_interval: next_interval(latest, &self.sleep_mode),
            error: last_error,
            last_quantity: latest,
        }
    }

    /// One attempt. The browser is closed whatever the outcome.
    async fn attempt(&self, latest: &mut f64) -> CycleResult<Observation> {
        let seed = self.session.seed();
        let page = self
            .launcher
            .launch(seed.as_ref())
            .await
            .map_err(|e| CycleError::Browser(e.to_string()))?;

        let result = self.drive(page.as_ref(), latest).await;

        if let Err(e) = page.close().await {
            tracing::warn!("browser did not close cleanly: {e}");
        }
        result
    }

    /// `latest` takes the fresh reading as soon as it is stored, so a failed
    /// top-up still schedules from it.
    async fn drive(&self, page: &dyn PortalPage, latest: &mut f64) -> CycleResult<Observation> {
        let outcome = self.session.ensure(page).await?;
        tracing::debug!(?outcome, "session ready");

        let measurement = self.extractor.read(page).await?;
        tracing::info!(
            quantity = measurement.quantity,
            plan = measurement.plan.as_str(),
            "remaining volume read"
        );

        self.state.save(&PersistedState::new(measurement.quantity))?;
        *latest = measurement.quantity;
        let interval = next_interval(measurement.quantity, &self.sleep_mode);

        let identifier = self.session.identifier();
        let label = &self.trigger.policy().label;
        let message = match self.trigger.maybe_top_up(page, &measurement).await? {
            TopUp::NotNeeded => messages::remaining(identifier, measurement.quantity, interval),
            TopUp::Performed(TopUpPath::Structured) => {
                messages::topped_up(identifier, measurement.quantity, label)
            }
            TopUp::Performed(TopUpPath::BroadScan) => {
                messages::topped_up_by_scan(identifier, measurement.quantity, label)
            }
        };
        notify_best_effort(self.notifier.as_ref(), &message).await;

        Ok(Observation {
            quantity: measurement.quantity,
            interval,
        })
    }
}
