//! topup-core: session handling, volume extraction, top-up triggering and
//! adaptive scheduling for a mobile-portal poller.
//!
//! The browser is abstracted behind [`page::Launcher`] and [`page::PortalPage`];
//! the agent binary supplies a Chromium implementation.

pub mod action;
pub mod config;
pub mod extract;
pub mod health;
pub mod notify;
pub mod page;
pub mod retry;
pub mod runner;
pub mod scheduler;
pub mod selectors;
pub mod session;
pub mod storage;
pub mod types;

#[cfg(test)]
mod testing;

pub use action::{ActionTrigger, TopUpPolicy};
pub use config::{BrowserEngine, Config, ConfigSource, NotifySettings};
pub use extract::{parse_volume, Extractor};
pub use health::Health;
pub use notify::{notify_best_effort, Notifier, NullNotifier};
pub use page::{ElementSnapshot, Launcher, PortalPage, SessionState, StoredCookie};
pub use retry::RetryPolicy;
pub use runner::Runner;
pub use scheduler::{compute_interval, next_interval, SleepMode};
pub use selectors::{LayoutTable, PORTAL_LAYOUT};
pub use session::{LoginCredentials, PortalUrls, SessionManager};
pub use storage::{CredentialStore, StateStore};
pub use types::*;
