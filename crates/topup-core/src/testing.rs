//! In-memory portal used by the unit tests.

use crate::page::{ElementSnapshot, Launcher, PortalPage, SessionState, StoredCookie};
use crate::selectors::{DASHBOARD_HEADING, FALLBACK_LOGIN_SUBMIT, LOGIN_SUBMIT};
use crate::types::PageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const LOGIN_URL: &str = "https://login.example.test/signin/#login/";
pub const DASHBOARD_URL: &str = "https://portal.example.test/user/auth/account-overview/";

#[derive(Debug, Default)]
struct Dom {
    url: String,
    elements: HashMap<String, Vec<ElementSnapshot>>,
    log: Vec<String>,
    logged_in: bool,
    /// Cookies seeded at launch still open a live session.
    cookies_valid: bool,
    /// Cookies seeded at launch are accepted without redirect, but the session is dead.
    cookies_stale: bool,
    login_works: bool,
    failing_launches: u32,
    /// Clicks on a selector that fail before one goes through.
    failing_clicks: HashMap<String, u32>,
    launches: u32,
    closed: u32,
    seeded: Vec<bool>,
}

/// Shared state behind fake launchers and pages.
#[derive(Clone, Default)]
pub struct FakePortal {
    dom: Arc<Mutex<Dom>>,
}

impl FakePortal {
    pub fn new() -> Self {
        let portal = Self::default();
        portal.with(|d| d.login_works = true);
        portal
    }

    fn with<R>(&self, f: impl FnOnce(&mut Dom) -> R) -> R {
        f(&mut self.dom.lock().unwrap())
    }

    pub fn page(&self) -> FakePage {
        FakePage {
            dom: Arc::clone(&self.dom),
        }
    }

    pub fn launcher(&self) -> FakeLauncher {
        FakeLauncher {
            portal: self.clone(),
        }
    }

    pub fn set_elements(&self, selector: &str, elements: Vec<ElementSnapshot>) {
        self.with(|d| d.elements.insert(selector.to_string(), elements));
    }

    pub fn set_text(&self, selector: &str, text: &str) {
        self.set_elements(selector, vec![ElementSnapshot::new(true, text)]);
    }

    pub fn set_cookies_valid(&self, valid: bool) {
        self.with(|d| d.cookies_valid = valid);
    }

    pub fn set_cookies_stale(&self, stale: bool) {
        self.with(|d| d.cookies_stale = stale);
    }

    pub fn set_login_works(&self, works: bool) {
        self.with(|d| d.login_works = works);
    }

    pub fn fail_launches(&self, count: u32) {
        self.with(|d| d.failing_launches = count);
    }

    pub fn fail_clicks(&self, selector: &str, count: u32) {
        self.with(|d| d.failing_clicks.insert(selector.to_string(), count));
    }

    pub fn log(&self) -> Vec<String> {
        self.with(|d| d.log.clone())
    }

    pub fn launches(&self) -> u32 {
        self.with(|d| d.launches)
    }

    pub fn closed(&self) -> u32 {
        self.with(|d| d.closed)
    }

    /// Whether each launch was seeded with cookies.
    pub fn seeded(&self) -> Vec<bool> {
        self.with(|d| d.seeded.clone())
    }
}

pub struct FakeLauncher {
    portal: FakePortal,
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self, session: Option<&SessionState>) -> Result<Box<dyn PortalPage>, PageError> {
        let failed = self.portal.with(|d| {
            d.launches += 1;
            if d.failing_launches > 0 {
                d.failing_launches -= 1;
                return true;
            }
            d.seeded.push(session.is_some());
            d.url = "about:blank".into();
            d.logged_in = session.is_some() && (d.cookies_valid || d.cookies_stale);
            false
        });
        if failed {
            return Err(PageError::Browser("launch refused".into()));
        }
        Ok(Box::new(self.portal.page()))
    }
}

pub struct FakePage {
    dom: Arc<Mutex<Dom>>,
}

impl FakePage {
    fn with<R>(&self, f: impl FnOnce(&mut Dom) -> R) -> R {
        f(&mut self.dom.lock().unwrap())
    }
}

#[async_trait]
impl PortalPage for FakePage {
    async fn goto(&self, url: &str) -> Result<(), PageError> {
        self.with(|d| {
            d.log.push(format!("goto:{url}"));
            d.url = if url == DASHBOARD_URL && !d.logged_in {
                LOGIN_URL.to_string()
            } else {
                url.to_string()
            };
        });
        Ok(())
    }

    async fn current_url(&self) -> Result<String, PageError> {
        Ok(self.with(|d| d.url.clone()))
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>, PageError> {
        Ok(self
            .elements(selector)
            .await?
            .into_iter()
            .next()
            .map(|e| e.text))
    }

    async fn elements(&self, selector: &str) -> Result<Vec<ElementSnapshot>, PageError> {
        Ok(self.with(|d| {
            d.log.push(format!("elements:{selector}"));
            if selector == DASHBOARD_HEADING {
                let live = d.logged_in && !d.cookies_stale && d.url == DASHBOARD_URL;
                return if live {
                    vec![ElementSnapshot::new(true, "Übersicht")]
                } else {
                    Vec::new()
                };
            }
            if selector == LOGIN_SUBMIT || selector == FALLBACK_LOGIN_SUBMIT {
                return if d.url == LOGIN_URL {
                    vec![ElementSnapshot::new(true, "Einloggen")]
                } else {
                    Vec::new()
                };
            }
            d.elements.get(selector).cloned().unwrap_or_default()
        }))
    }

    async fn click_nth(&self, selector: &str, index: usize) -> Result<(), PageError> {
        self.with(|d| {
            d.log.push(format!("click:{selector}#{index}"));
            if let Some(left) = d.failing_clicks.get_mut(selector).filter(|left| **left > 0) {
                *left -= 1;
                return Err(PageError::Interaction {
                    selector: selector.to_string(),
                    reason: "element is not clickable".into(),
                });
            }
            if (selector == LOGIN_SUBMIT || selector == FALLBACK_LOGIN_SUBMIT) && d.login_works {
                d.logged_in = true;
                d.cookies_stale = false;
                d.url = DASHBOARD_URL.to_string();
            }
            Ok(())
        })
    }

    async fn type_text(&self, selector: &str, text: &str, _key_delay: Duration) -> Result<(), PageError> {
        self.with(|d| d.log.push(format!("type:{selector}={text}")));
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), PageError> {
        self.with(|d| d.log.push(format!("fill:{selector}={value}")));
        Ok(())
    }

    async fn hover(&self, selector: &str) -> Result<(), PageError> {
        self.with(|d| d.log.push(format!("hover:{selector}")));
        Ok(())
    }

    async fn session_state(&self) -> Result<SessionState, PageError> {
        Ok(SessionState {
            cookies: vec![StoredCookie {
                name: "sid".into(),
                value: "fake".into(),
                domain: ".example.test".into(),
                path: "/".into(),
                expires: None,
                http_only: true,
                secure: true,
            }],
        })
    }

    async fn close(self: Box<Self>) -> Result<(), PageError> {
        self.with(|d| {
            d.closed += 1;
            d.log.push("close".into());
        });
        Ok(())
    }
}
