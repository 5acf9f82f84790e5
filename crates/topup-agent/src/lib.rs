//! topup-agent: Chromium driver, Telegram notifier and CLI around `topup-core`.

pub mod browser;
pub mod cli;
pub mod telegram;
pub mod update;
