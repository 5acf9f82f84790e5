//! Browser engines behind the core's `Launcher`/`PortalPage` traits.
//!
//! Only Chromium is driven (over CDP); other engines requested in the
//! configuration fall back to it.

pub mod chromium;

pub use chromium::{find_chromium, ChromiumLauncher, ChromiumPage};

use topup_core::BrowserEngine;

/// Build the launcher for the configured engine.
pub fn launcher_for(engine: BrowserEngine, user_agent: &str) -> anyhow::Result<ChromiumLauncher> {
    if engine != BrowserEngine::Chromium {
        tracing::warn!(
            "browser engine '{}' is not supported, using chromium",
            engine.as_str()
        );
    }
    ChromiumLauncher::new(user_agent)
}
