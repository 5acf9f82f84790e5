//! Status notifications.

use crate::types::NotifyError;
use async_trait::async_trait;

/// A channel that delivers human-readable status messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

/// Used when notifications are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        tracing::debug!("notifications disabled, dropping: {message}");
        Ok(())
    }
}

/// Send `message`, logging instead of propagating any failure.
pub async fn notify_best_effort(notifier: &dyn Notifier, message: &str) {
    if let Err(e) = notifier.send(message).await {
        tracing::error!("notification failed: {e}");
    }
}

/// Message texts, prefixed with the account identifier.
pub mod messages {
    pub fn remaining(identifier: &str, quantity: f64, next_interval: u64) -> String {
        format!("{identifier}: {quantity:.2} GB left. Next check in {next_interval} seconds. ✅")
    }

    pub fn topped_up(identifier: &str, quantity: f64, label: &str) -> String {
        format!("{identifier}: {quantity:.2} GB left, {label} booked. 📲")
    }

    pub fn topped_up_by_scan(identifier: &str, quantity: f64, label: &str) -> String {
        format!("{identifier}: {quantity:.2} GB left, {label} booked via page scan. 📲")
    }

    pub fn failed(identifier: &str, error: &str) -> String {
        format!("{identifier}: ❌ could not check the data volume: {error}")
    }

    pub fn gave_up(identifier: &str, attempts: u32) -> String {
        format!("{identifier}: ❌ giving up after {attempts} attempts, retrying next cycle.")
    }

    pub fn update_available(current: &str, latest: &str) -> String {
        format!("🚀 topup-agent {latest} is available (running {current}).")
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every message; optionally fails each send.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<String>>,
        pub fail: bool,
    }

    impl RecordingNotifier {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, message: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(message.to_string());
            if self.fail {
                return Err(NotifyError::Exhausted {
                    attempts: 3,
                    last: "offline".into(),
                });
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::recording::RecordingNotifier;
    use super::*;

    #[tokio::test]
    async fn test_best_effort_swallows_errors() {
        let notifier = RecordingNotifier::failing();
        notify_best_effort(&notifier, "hello").await;
        assert_eq!(notifier.messages(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_null_notifier_accepts_everything() {
        assert!(NullNotifier.send("x").await.is_ok());
    }

    #[test]
    fn test_messages_carry_identifier_and_quantity() {
        let msg = messages::remaining("0151", 3.456, 600);
        assert!(msg.starts_with("0151: 3.46 GB left"));
        assert!(msg.contains("600 seconds"));
        assert!(messages::topped_up("0151", 0.8, "1 GB").contains("0.80 GB"));
    }
}
