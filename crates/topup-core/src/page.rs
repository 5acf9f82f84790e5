//! Browser page abstraction.
//!
//! Defines the `Launcher` and `PortalPage` traits that abstract over the
//! browser engine, plus the interaction helpers (waits, retried clicks,
//! consent banner handling) every component builds on.

use crate::retry::RetryPolicy;
use crate::selectors::{CONSENT_DENY, CONSENT_DENY_KEYWORDS};
use crate::types::{CycleError, PageError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Polling period while waiting for a selector.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Pause after dismissing the consent banner.
const CONSENT_SETTLE: Duration = Duration::from_secs(1);

/// One cookie of the persisted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Seconds since the epoch; absent for session cookies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

fn default_path() -> String {
    "/".to_string()
}

/// Reusable login artifact: the browser's cookie jar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub cookies: Vec<StoredCookie>,
}

impl SessionState {
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// Visibility and text of one matched element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub visible: bool,
    pub text: String,
}

impl ElementSnapshot {
    pub fn new(visible: bool, text: impl Into<String>) -> Self {
        Self {
            visible,
            text: text.into(),
        }
    }
}

/// Starts a fresh browser for one attempt.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Launch a browser and open a page, seeded with `session` cookies if given.
    async fn launch(&self, session: Option<&SessionState>) -> Result<Box<dyn PortalPage>, PageError>;
}

/// A single page in a running browser.
#[async_trait]
pub trait PortalPage: Send + Sync {
    /// Navigate and wait for the DOM to be loaded.
    async fn goto(&self, url: &str) -> Result<(), PageError>;
    /// The URL after any redirects.
    async fn current_url(&self) -> Result<String, PageError>;
    /// Text content of the first match, `None` if nothing matches.
    async fn text_content(&self, selector: &str) -> Result<Option<String>, PageError>;
    /// Every match of `selector`, in document order.
    async fn elements(&self, selector: &str) -> Result<Vec<ElementSnapshot>, PageError>;
    /// Click the `index`-th match of `selector`.
    async fn click_nth(&self, selector: &str, index: usize) -> Result<(), PageError>;
    /// Type into the first match key by key.
    async fn type_text(&self, selector: &str, text: &str, key_delay: Duration) -> Result<(), PageError>;
    /// Set the value of the first match in one step.
    async fn fill(&self, selector: &str, value: &str) -> Result<(), PageError>;
    async fn hover(&self, selector: &str) -> Result<(), PageError>;
    /// Export the cookie jar.
    async fn session_state(&self) -> Result<SessionState, PageError>;
    /// Close the page and shut the browser down.
    async fn close(self: Box<Self>) -> Result<(), PageError>;

    async fn click(&self, selector: &str) -> Result<(), PageError> {
        self.click_nth(selector, 0).await
    }
}

/// Wait until `selector` has a visible match.
pub async fn wait_for_visible(page: &dyn PortalPage, selector: &str) -> Result<(), PageError> {
    loop {
        if page.elements(selector).await?.iter().any(|e| e.visible) {
            return Ok(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Wait for `selector` under `policy`.
pub async fn wait_for_selector(
    page: &dyn PortalPage,
    selector: &str,
    policy: &RetryPolicy,
) -> Result<(), CycleError> {
    policy
        .run(selector, || wait_for_visible(page, selector))
        .await
        .map_err(|e| CycleError::Timeout {
            what: selector.to_string(),
            attempts: e.attempts,
        })
}

/// Wait for `selector` and click it, retrying under `policy`.
pub async fn wait_and_click(
    page: &dyn PortalPage,
    selector: &str,
    policy: &RetryPolicy,
) -> Result<(), CycleError> {
    tracing::info!("clicking {selector}");
    policy
        .run(selector, || async {
            wait_for_visible(page, selector).await?;
            page.click(selector).await
        })
        .await
        .map_err(|e| {
            tracing::error!("could not click {selector}: {}", e.last_error);
            CycleError::Timeout {
                what: selector.to_string(),
                attempts: e.attempts,
            }
        })
}

/// Navigate, let the page settle, then get the consent banner out of the way.
pub async fn open(page: &dyn PortalPage, url: &str, settle: Duration) -> Result<(), PageError> {
    tracing::debug!("navigating to {url}");
    page.goto(url).await?;
    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }
    dismiss_consent_banner(page).await;
    Ok(())
}

/// Decline the consent banner if one is shown. Never fails.
pub async fn dismiss_consent_banner(page: &dyn PortalPage) {
    if let Err(e) = try_dismiss_consent_banner(page).await {
        tracing::warn!("consent banner handling failed: {e}");
    }
}

async fn try_dismiss_consent_banner(page: &dyn PortalPage) -> Result<(), PageError> {
    let deny = page.elements(CONSENT_DENY).await?;
    if let Some(index) = deny.iter().position(|e| e.visible) {
        tracing::info!("declining consent banner");
        page.click_nth(CONSENT_DENY, index).await?;
        tokio::time::sleep(CONSENT_SETTLE).await;
        return Ok(());
    }

    let buttons = page.elements("button").await?;
    let hit = buttons.iter().position(|b| {
        let text = b.text.trim().to_lowercase();
        b.visible
            && CONSENT_DENY_KEYWORDS
                .iter()
                .any(|k| text.contains(&k.to_lowercase()))
    });
    if let Some(index) = hit {
        tracing::info!("declining consent banner via '{}'", buttons[index].text.trim());
        page.click_nth("button", index).await?;
        tokio::time::sleep(CONSENT_SETTLE).await;
    } else {
        tracing::debug!("no consent banner");
    }
    Ok(())
}
