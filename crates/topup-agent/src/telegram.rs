//! Telegram bot notifications.

use async_trait::async_trait;
use std::time::Duration;
use topup_core::notify::Notifier;
use topup_core::{NotifyError, NotifySettings};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Delivery attempts per message.
pub const SEND_ATTEMPTS: u32 = 3;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Posts messages to one chat through the Bot API.
pub struct TelegramNotifier {
    api_base: String,
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: &str) -> Self {
        Self::with_api_base(DEFAULT_API_BASE, bot_token, chat_id)
    }

    /// Use a different Bot API endpoint.
    pub fn with_api_base(api_base: &str, bot_token: &str, chat_id: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            client,
        }
    }

    /// `None` when notifications are disabled.
    pub fn from_settings(settings: &NotifySettings) -> Option<Self> {
        settings
            .enabled
            .then(|| Self::new(&settings.bot_token, &settings.chat_id))
    }

    async fn post(&self, message: &str) -> Result<(), String> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let resp = self
            .client
            .post(&url)
            .form(&[("chat_id", self.chat_id.as_str()), ("text", message)])
            .send()
            .await
            .map_err(|e| e.without_url().to_string())?;

        if !resp.status().is_success() {
            return Err(format!(
                "{} {}",
                resp.status(),
                resp.text().await.unwrap_or_default()
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        if self.bot_token.is_empty() || self.chat_id.is_empty() {
            return Err(NotifyError::Misconfigured(
                "bot token and chat id are required".into(),
            ));
        }

        let mut last = String::new();
        for attempt in 1..=SEND_ATTEMPTS {
            match self.post(message).await {
                Ok(()) => {
                    tracing::debug!("telegram message sent");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("telegram attempt {attempt}/{SEND_ATTEMPTS} failed: {e}");
                    last = e;
                }
            }
        }
        Err(NotifyError::Exhausted {
            attempts: SEND_ATTEMPTS,
            last,
        })
    }
}
