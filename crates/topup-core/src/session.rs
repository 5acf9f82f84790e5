//! Keeps an authenticated portal session.
//!
//! ```text
//! start ──► dashboard ──redirected──► login (typed) ──► verify ──► persist
//!               │
//!               └─not redirected──► heading live? ──yes──► refresh cookies
//!                                        │
//!                                        no ──► discard cookies ──► login (filled) ──► verify ──► persist
//! ```

use crate::page::{open, wait_and_click, wait_for_selector, PortalPage, SessionState};
use crate::retry::RetryPolicy;
use crate::selectors::{
    DASHBOARD_HEADING, DASHBOARD_HEADING_TEXT, FALLBACK_LOGIN_SUBMIT, IDENTIFIER_FIELD,
    LOGIN_SUBMIT, SECRET_FIELD,
};
use crate::storage::CredentialStore;
use crate::types::{CycleError, CycleResult};
use std::time::Duration;

/// Portal endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalUrls {
    pub login: String,
    pub dashboard: String,
}

impl Default for PortalUrls {
    fn default() -> Self {
        Self {
            login: "https://login.alditalk-kundenbetreuung.de/signin/XUI/#login/".to_string(),
            dashboard: "https://www.alditalk-kundenportal.de/user/auth/account-overview/".to_string(),
        }
    }
}

/// Account login.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    pub identifier: String,
    pub secret: String,
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("identifier", &self.identifier)
            .field("secret", &"***")
            .finish()
    }
}

/// Delays and retry budgets of the login flow.
#[derive(Debug, Clone, Copy)]
pub struct SessionTimings {
    /// Pause after loading the dashboard, before checking for a redirect.
    pub after_dashboard: Duration,
    /// Wait after submitting the typed login form.
    pub login_settle: Duration,
    /// Wait after submitting the filled fallback form.
    pub fallback_settle: Duration,
    /// How long the dashboard heading may take to appear.
    pub heading_timeout: Duration,
    pub identifier_key_delay: Duration,
    pub secret_key_delay: Duration,
    pub click: RetryPolicy,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            after_dashboard: Duration::from_secs(3),
            login_settle: Duration::from_secs(15),
            fallback_settle: Duration::from_secs(8),
            heading_timeout: Duration::from_secs(8),
            identifier_key_delay: Duration::from_millis(100),
            secret_key_delay: Duration::from_millis(120),
            click: RetryPolicy::click(),
        }
    }
}

impl SessionTimings {
    /// No delays, one short attempt per wait.
    #[cfg(test)]
    pub(crate) fn immediate() -> Self {
        Self {
            after_dashboard: Duration::ZERO,
            login_settle: Duration::ZERO,
            fallback_settle: Duration::ZERO,
            heading_timeout: Duration::from_millis(50),
            identifier_key_delay: Duration::ZERO,
            secret_key_delay: Duration::ZERO,
            click: RetryPolicy::new(2, Duration::from_millis(50), Duration::ZERO),
        }
    }
}

/// How the session was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Persisted cookies were still valid.
    Reused,
    /// Redirected to the login form and signed in.
    LoggedIn,
    /// Cookies were accepted but dead; signed in through the fallback form.
    Recovered,
}

/// Login form variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginForm {
    /// Key-by-key typing and the main-action submit button.
    Typed,
    /// Direct value fill and the fallback submit button.
    Filled,
}

/// Owns the persisted cookies and drives the login flow.
#[derive(Debug, Clone)]
pub struct SessionManager {
    urls: PortalUrls,
    credentials: LoginCredentials,
    store: CredentialStore,
    timings: SessionTimings,
}

impl SessionManager {
    pub fn new(urls: PortalUrls, credentials: LoginCredentials, store: CredentialStore) -> Self {
        Self {
            urls,
            credentials,
            store,
            timings: SessionTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: SessionTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.credentials.identifier
    }

    /// Cookies to seed the next browser with, if any were persisted.
    pub fn seed(&self) -> Option<SessionState> {
        match self.store.load() {
            Ok(Some(state)) => {
                tracing::info!("loading saved cookies");
                Some(state)
            }
            Ok(None) => {
                tracing::info!("no saved cookies, starting a fresh context");
                None
            }
            Err(e) => {
                tracing::warn!("saved cookies unreadable, starting fresh: {e}");
                None
            }
        }
    }

    /// Leave `page` on the authenticated dashboard.
    pub async fn ensure(&self, page: &dyn PortalPage) -> CycleResult<SessionOutcome> {
        open(page, &self.urls.dashboard, self.timings.after_dashboard).await?;

        let url = page.current_url().await?;
        if url.contains("login") {
            tracing::info!("not logged in, signing in");
            self.login(page, LoginForm::Typed).await?;
            return Ok(SessionOutcome::LoggedIn);
        }

        tracing::info!("dashboard reachable with saved session");
        let outcome = if self.dashboard_live(page).await {
            SessionOutcome::Reused
        } else {
            tracing::warn!("session looks expired, signing in again");
            if let Err(e) = self.store.discard() {
                tracing::warn!("could not delete stale cookies: {e}");
            } else {
                tracing::info!("stale cookies deleted");
            }
            self.login(page, LoginForm::Filled).await?;
            SessionOutcome::Recovered
        };

        self.keep_alive(page).await;
        tracing::info!("refreshing saved cookies");
        self.persist(page).await?;
        Ok(outcome)
    }

    async fn login(&self, page: &dyn PortalPage, form: LoginForm) -> CycleResult<()> {
        open(page, &self.urls.login, Duration::ZERO).await?;

        let LoginCredentials { identifier, secret } = &self.credentials;
        let (submit, settle) = match form {
            LoginForm::Typed => {
                page.type_text(IDENTIFIER_FIELD, identifier, self.timings.identifier_key_delay)
                    .await?;
                page.type_text(SECRET_FIELD, secret, self.timings.secret_key_delay)
                    .await?;
                (LOGIN_SUBMIT, self.timings.login_settle)
            }
            LoginForm::Filled => {
                page.fill(IDENTIFIER_FIELD, identifier).await?;
                page.fill(SECRET_FIELD, secret).await?;
                (FALLBACK_LOGIN_SUBMIT, self.timings.fallback_settle)
            }
        };

        wait_and_click(page, submit, &self.timings.click)
            .await
            .map_err(|e| CycleError::Authentication(format!("login button not clickable: {e}")))?;

        tracing::info!("waiting {}s for login", settle.as_secs());
        tokio::time::sleep(settle).await;

        if !self.dashboard_live(page).await {
            return Err(CycleError::Authentication(
                "dashboard heading not visible after login".to_string(),
            ));
        }

        tracing::info!("login succeeded, saving cookies");
        self.persist(page).await
    }

    /// The dashboard heading is shown and carries the overview title.
    async fn dashboard_live(&self, page: &dyn PortalPage) -> bool {
        let policy = RetryPolicy::single(self.timings.heading_timeout);
        if wait_for_selector(page, DASHBOARD_HEADING, &policy).await.is_err() {
            return false;
        }
        matches!(
            page.text_content(DASHBOARD_HEADING).await,
            Ok(Some(heading)) if heading.contains(DASHBOARD_HEADING_TEXT)
        )
    }

    /// Hover the heading so the portal registers activity.
    async fn keep_alive(&self, page: &dyn PortalPage) {
        match page.hover(DASHBOARD_HEADING).await {
            Ok(()) => tracing::info!("session activity simulated"),
            Err(e) => tracing::warn!("keep-alive hover failed: {e}"),
        }
    }

    async fn persist(&self, page: &dyn PortalPage) -> CycleResult<()> {
        let state = page.session_state().await?;
        self.store.save(&state)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePortal, DASHBOARD_URL, LOGIN_URL};
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> SessionManager {
        SessionManager::new(
            PortalUrls {
                login: LOGIN_URL.to_string(),
                dashboard: DASHBOARD_URL.to_string(),
            },
            LoginCredentials {
                identifier: "015112345678".to_string(),
                secret: "hunter2".to_string(),
            },
            CredentialStore::new(dir.path().join("cookies.json")),
        )
        .with_timings(SessionTimings::immediate())
    }

    #[tokio::test]
    async fn test_fresh_login_types_credentials() {
        let dir = TempDir::new().unwrap();
        let portal = FakePortal::new();
        let mgr = manager(&dir);
        let page = crate::page::Launcher::launch(&portal.launcher(), None)
            .await
            .unwrap();

        let outcome = mgr.ensure(page.as_ref()).await.unwrap();
        assert_eq!(outcome, SessionOutcome::LoggedIn);

        let log = portal.log();
        assert!(log.contains(&format!("type:{IDENTIFIER_FIELD}=015112345678")));
        assert!(log.contains(&format!("type:{SECRET_FIELD}=hunter2")));
        assert!(log.contains(&format!("click:{LOGIN_SUBMIT}#0")));
        assert!(mgr.seed().is_some());
    }

    #[tokio::test]
    async fn test_valid_cookies_are_reused_and_refreshed() {
        let dir = TempDir::new().unwrap();
        let portal = FakePortal::new();
        portal.set_cookies_valid(true);
        let mgr = manager(&dir);

        let seed = SessionState::default();
        let page = crate::page::Launcher::launch(&portal.launcher(), Some(&seed))
            .await
            .unwrap();
        let outcome = mgr.ensure(page.as_ref()).await.unwrap();

        assert_eq!(outcome, SessionOutcome::Reused);
        let log = portal.log();
        assert!(!log.iter().any(|l| l.starts_with("type:") || l.starts_with("fill:")));
        assert!(log.contains(&format!("hover:{DASHBOARD_HEADING}")));
        assert!(mgr.seed().is_some());
    }

    #[tokio::test]
    async fn test_stale_cookies_use_fallback_form() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir);
        mgr.store.save(&SessionState::default()).unwrap();

        let portal = FakePortal::new();
        portal.set_cookies_stale(true);
        let seed = mgr.seed();
        let page = crate::page::Launcher::launch(&portal.launcher(), seed.as_ref())
            .await
            .unwrap();

        let outcome = mgr.ensure(page.as_ref()).await.unwrap();
        assert_eq!(outcome, SessionOutcome::Recovered);

        let log = portal.log();
        assert!(log.contains(&format!("fill:{IDENTIFIER_FIELD}=015112345678")));
        assert!(log.contains(&format!("click:{FALLBACK_LOGIN_SUBMIT}#0")));
        assert!(!log.iter().any(|l| l.starts_with("type:")));
        // Fresh cookies were written after recovery.
        assert!(!mgr.seed().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_login_is_authentication_error() {
        let dir = TempDir::new().unwrap();
        let portal = FakePortal::new();
        portal.set_login_works(false);
        let mgr = manager(&dir);
        let page = crate::page::Launcher::launch(&portal.launcher(), None)
            .await
            .unwrap();

        let err = mgr.ensure(page.as_ref()).await.unwrap_err();
        assert!(matches!(err, CycleError::Authentication(_)));
        assert!(mgr.seed().is_none());
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let creds = LoginCredentials {
            identifier: "0151".into(),
            secret: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
