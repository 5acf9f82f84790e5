//! Chromium-backed portal page using chromiumoxide.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use topup_core::page::{ElementSnapshot, Launcher, PortalPage, SessionState, StoredCookie};
use topup_core::PageError;

/// Hosts with at most this much RAM get the low-memory launch flags.
const LOW_MEMORY_BYTES: u64 = 2 * 1024 * 1024 * 1024;

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Browser names looked up on `PATH`, in order of preference.
const BROWSER_NAMES: [&str; 4] = [
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
];

/// Locate a Chromium binary: `TOPUP_CHROMIUM_PATH` first, then `PATH`.
pub fn find_chromium() -> Option<PathBuf> {
    std::env::var_os("TOPUP_CHROMIUM_PATH")
        .map(PathBuf::from)
        .filter(|path| path.exists())
        .or_else(|| BROWSER_NAMES.iter().find_map(|name| which::which(name).ok()))
}

/// Total RAM in bytes, `None` if the platform doesn't report it.
pub fn total_memory_bytes() -> Option<u64> {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    match sys.total_memory() {
        0 => None,
        bytes => Some(bytes),
    }
}

/// Whether Chromium should be started with the low-memory flags.
pub fn is_low_memory_host() -> bool {
    total_memory_bytes().is_some_and(|bytes| bytes <= LOW_MEMORY_BYTES)
}

/// Quote `s` as a JS string literal. `<` and `>` are escaped so the literal
/// can never close a surrounding script tag.
pub fn js_string(s: &str) -> String {
    serde_json::Value::from(s)
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
}

/// Starts one headless Chromium per attempt.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    executable: PathBuf,
    user_agent: String,
    low_memory: bool,
}

impl ChromiumLauncher {
    /// Locate Chromium and size the launch flags for this host.
    pub fn new(user_agent: impl Into<String>) -> Result<Self> {
        let executable = find_chromium()
            .context("Chromium not found. Install it or set TOPUP_CHROMIUM_PATH.")?;
        let low_memory = is_low_memory_host();
        if low_memory {
            tracing::info!("low-memory host detected, using reduced Chromium flags");
        }
        Ok(Self {
            executable,
            user_agent: user_agent.into(),
            low_memory,
        })
    }

    pub fn executable(&self) -> &PathBuf {
        &self.executable
    }

    fn config(&self) -> Result<BrowserConfig, PageError> {
        let mut builder = BrowserConfig::builder()
            .chrome_executable(&self.executable)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg(format!("--user-agent={}", self.user_agent));
        if self.low_memory {
            builder = builder.arg("--no-sandbox").arg("--disable-dev-shm-usage");
        }
        builder
            .build()
            .map_err(|e| PageError::Browser(format!("failed to build browser config: {e}")))
    }
}

#[async_trait]
impl Launcher for ChromiumLauncher {
    async fn launch(
        &self,
        session: Option<&SessionState>,
    ) -> Result<Box<dyn PortalPage>, PageError> {
        let (browser, mut handler) = Browser::launch(self.config()?)
            .await
            .map_err(|e| PageError::Browser(format!("failed to launch Chromium: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let chromium = ChromiumPage {
                    browser,
                    handler,
                    page: None,
                };
                let _ = Box::new(chromium).close().await;
                return Err(PageError::Browser(format!("failed to create page: {e}")));
            }
        };

        let chromium = ChromiumPage {
            browser,
            handler,
            page: Some(page),
        };

        if let Some(session) = session.filter(|s| !s.is_empty()) {
            if let Err(e) = chromium.restore_cookies(session).await {
                tracing::warn!("could not restore saved cookies: {e}");
            }
        }

        Ok(Box::new(chromium))
    }
}

/// A browser with its single page.
pub struct ChromiumPage {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Option<Page>,
}

impl ChromiumPage {
    fn page(&self) -> Result<&Page, PageError> {
        self.page
            .as_ref()
            .ok_or_else(|| PageError::Browser("page already closed".into()))
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value, PageError> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| PageError::Script(e.to_string()))?;
        result
            .into_value()
            .map_err(|e| PageError::Script(format!("failed to convert JS result: {e:?}")))
    }

    async fn restore_cookies(&self, session: &SessionState) -> Result<(), PageError> {
        let params = session
            .cookies
            .iter()
            .map(to_cookie_param)
            .collect::<Result<Vec<_>, _>>()?;
        let count = params.len();
        self.browser
            .set_cookies(params)
            .await
            .map_err(|e| PageError::Browser(format!("failed to set cookies: {e}")))?;
        tracing::debug!("restored {count} cookies");
        Ok(())
    }
}

fn to_cookie_param(cookie: &StoredCookie) -> Result<CookieParam, PageError> {
    CookieParam::builder()
        .name(cookie.name.clone())
        .value(cookie.value.clone())
        .domain(cookie.domain.clone())
        .path(cookie.path.clone())
        .secure(cookie.secure)
        .http_only(cookie.http_only)
        .build()
        .map_err(|e| PageError::Browser(format!("invalid cookie {}: {e}", cookie.name)))
}

fn from_cookie(cookie: Cookie) -> StoredCookie {
    StoredCookie {
        name: cookie.name,
        value: cookie.value,
        domain: cookie.domain,
        path: cookie.path,
        expires: (!cookie.session && cookie.expires > 0.0).then_some(cookie.expires),
        http_only: cookie.http_only,
        secure: cookie.secure,
    }
}

#[async_trait]
impl PortalPage for ChromiumPage {
    async fn goto(&self, url: &str) -> Result<(), PageError> {
        let page = self.page()?;
        match tokio::time::timeout(NAVIGATION_TIMEOUT, page.goto(url)).await {
            Ok(Ok(_)) => {
                let _ = page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => Err(PageError::Navigation(format!("{url}: {e}"))),
            Err(_) => Err(PageError::Navigation(format!(
                "{url}: timed out after {}s",
                NAVIGATION_TIMEOUT.as_secs()
            ))),
        }
    }

    async fn current_url(&self) -> Result<String, PageError> {
        let url = self
            .page()?
            .url()
            .await
            .map_err(|e| PageError::Browser(format!("failed to get URL: {e}")))?
            .unwrap_or_default();
        Ok(url)
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>, PageError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({});
                return el ? el.textContent : null;
            }})()"#,
            js_string(selector)
        );
        let value = self.execute_js(&script).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn elements(&self, selector: &str) -> Result<Vec<ElementSnapshot>, PageError> {
        let script = format!(
            r#"(() => {{
                return [...document.querySelectorAll({})].map(el => {{
                    const rect = el.getBoundingClientRect();
                    const style = window.getComputedStyle(el);
                    const visible = rect.width > 0 && rect.height > 0
                        && style.visibility !== "hidden" && style.display !== "none";
                    return {{ visible, text: el.innerText || el.textContent || "" }};
                }});
            }})()"#,
            js_string(selector)
        );
        let value = self.execute_js(&script).await?;
        serde_json::from_value(value)
            .map_err(|e| PageError::Script(format!("unexpected element list: {e}")))
    }

    async fn click_nth(&self, selector: &str, index: usize) -> Result<(), PageError> {
        let elements = self
            .page()?
            .find_elements(selector)
            .await
            .map_err(|_| PageError::ElementNotFound(selector.to_string()))?;
        let element = elements
            .get(index)
            .ok_or_else(|| PageError::ElementNotFound(format!("{selector} #{index}")))?;
        element
            .click()
            .await
            .map_err(|e| PageError::Interaction {
                selector: selector.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str, key_delay: Duration) -> Result<(), PageError> {
        let interaction = |e: chromiumoxide::error::CdpError| PageError::Interaction {
            selector: selector.to_string(),
            reason: e.to_string(),
        };
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|_| PageError::ElementNotFound(selector.to_string()))?;
        element.click().await.map_err(interaction)?;
        for ch in text.chars() {
            element
                .type_str(ch.to_string())
                .await
                .map_err(interaction)?;
            if !key_delay.is_zero() {
                tokio::time::sleep(key_delay).await;
            }
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), PageError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({});
                if (!el) return false;
                el.focus();
                el.value = {};
                el.dispatchEvent(new Event("input", {{ bubbles: true }}));
                el.dispatchEvent(new Event("change", {{ bubbles: true }}));
                return true;
            }})()"#,
            js_string(selector),
            js_string(value)
        );
        match self.execute_js(&script).await?.as_bool() {
            Some(true) => Ok(()),
            _ => Err(PageError::ElementNotFound(selector.to_string())),
        }
    }

    async fn hover(&self, selector: &str) -> Result<(), PageError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({});
                if (!el) return false;
                for (const type of ["mouseover", "mouseenter", "mousemove"]) {{
                    el.dispatchEvent(new MouseEvent(type, {{ bubbles: true }}));
                }}
                return true;
            }})()"#,
            js_string(selector)
        );
        match self.execute_js(&script).await?.as_bool() {
            Some(true) => Ok(()),
            _ => Err(PageError::ElementNotFound(selector.to_string())),
        }
    }

    async fn session_state(&self) -> Result<SessionState, PageError> {
        let cookies = self
            .browser
            .get_cookies()
            .await
            .map_err(|e| PageError::Browser(format!("failed to read cookies: {e}")))?;
        Ok(SessionState {
            cookies: cookies.into_iter().map(from_cookie).collect(),
        })
    }

    async fn close(self: Box<Self>) -> Result<(), PageError> {
        let ChromiumPage {
            mut browser,
            handler,
            page,
        } = *self;

        if let Some(page) = page {
            let _ = page.close().await;
        }

        let shutdown = async {
            browser.close().await?;
            browser.wait().await?;
            Ok::<_, anyhow::Error>(())
        };
        let result = match tokio::time::timeout(CLOSE_TIMEOUT, shutdown).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(PageError::Browser(format!("browser shutdown failed: {e}"))),
            Err(_) => Err(PageError::Browser("browser shutdown timed out".into())),
        };
        if result.is_err() {
            let _ = browser.kill().await;
        }
        handler.abort();
        result
    }
}
