//! Event notification sink.
//!
//! Human-readable one-liners for the operator: startup, progress, burst
//! triggers, failovers, fatal conditions, shutdown summary. Delivery is
//! best-effort by contract; a notifier must swallow its own failures so
//! trading logic never blocks or aborts on a flaky webhook.

use crate::error::{TelemetryError, TelemetryResult};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Outbound notification sink.
///
/// Implementations never return errors; failures are logged internally.
pub trait EventNotifier: Send + Sync {
    /// Deliver one human-readable event line.
    fn notify(&self, text: &str) -> BoxFuture<'_, ()>;
}

/// Arc wrapper for notifier trait objects.
pub type DynNotifier = Arc<dyn EventNotifier>;

/// Sink that drops everything (notifications unconfigured).
pub struct NullNotifier;

impl EventNotifier for NullNotifier {
    fn notify(&self, text: &str) -> BoxFuture<'_, ()> {
        debug!(%text, "Notification dropped (null sink)");
        Box::pin(async {})
    }
}

/// Telegram sendMessage sink.
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_url: String,
    chat_id: String,
}

impl TelegramNotifier {
    /// Build a notifier for one bot token + chat.
    pub fn new(bot_token: &str, chat_id: impl Into<String>) -> TelemetryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| TelemetryError::NotifierInit(e.to_string()))?;
        Ok(Self {
            client,
            api_url: format!("https://api.telegram.org/bot{bot_token}/sendMessage"),
            chat_id: chat_id.into(),
        })
    }
}

impl EventNotifier for TelegramNotifier {
    fn notify(&self, text: &str) -> BoxFuture<'_, ()> {
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });
        Box::pin(async move {
            match self.client.post(&self.api_url).json(&body).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    warn!(status = %resp.status(), "Notification rejected");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Notification send failed");
                }
            }
        })
    }
}

/// Recording sink for tests.
pub struct MockNotifier {
    messages: parking_lot::Mutex<Vec<String>>,
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            messages: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// All messages delivered so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl EventNotifier for MockNotifier {
    fn notify(&self, text: &str) -> BoxFuture<'_, ()> {
        let text = text.to_string();
        Box::pin(async move {
            self.messages.lock().push(text);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_notifier_records() {
        let sink = MockNotifier::new();
        sink.notify("started").await;
        sink.notify("cycle 1 done").await;

        assert_eq!(sink.messages(), vec!["started", "cycle 1 done"]);
    }

    #[tokio::test]
    async fn test_null_notifier_is_silent() {
        let sink = NullNotifier;
        sink.notify("anything").await;
    }

    #[test]
    fn test_telegram_notifier_builds() {
        let sink = TelegramNotifier::new("123:abc", "42");
        assert!(sink.is_ok());
    }
}
