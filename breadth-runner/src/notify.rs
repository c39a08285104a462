//! Notification channel for completed runs.
//!
//! Delivery is best-effort: missing credentials degrade to the no-op
//! notifier with a warning, and a send failure is reported to the caller
//! without touching the run's artifacts.

use crate::report::NotifySummary;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport: {0}")]
    Transport(String),

    #[error("notification rejected: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    fn send(&self, summary: &NotifySummary) -> Result<(), NotifyError>;
}

/// Sink for runs with no configured channel.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn name(&self) -> &str {
        "noop"
    }

    fn send(&self, _summary: &NotifySummary) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Telegram Bot API channel (blocking `sendMessage`).
pub struct TelegramNotifier {
    client: reqwest::blocking::Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            client: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_else(|_| reqwest::blocking::Client::new()),
            base_url: TELEGRAM_API_BASE.to_string(),
            bot_token,
            chat_id,
        }
    }

    /// Read credentials from `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`.
    /// Returns `None` when either is unset.
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok()?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok()?;
        Some(Self::new(bot_token, chat_id))
    }

    /// Point the notifier at a different API host (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    fn send(&self, summary: &NotifySummary) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let text = summary.render();
        let response = self
            .client
            .post(&url)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text: &text,
            })
            .send()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Resolve the configured channel: Telegram when credentials are present,
/// otherwise the no-op sink plus a warning line.
pub fn resolve_notifier(warnings: &mut Vec<String>) -> Box<dyn Notifier> {
    match TelegramNotifier::from_env() {
        Some(notifier) => Box::new(notifier),
        None => {
            warnings.push(
                "TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID not set; notification skipped".to_string(),
            );
            Box::new(NoopNotifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn summary() -> NotifySummary {
        NotifySummary {
            date: NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
            new_highs: 30,
            new_lows: 5,
            ratio: 600,
            sample_size: 900,
            warnings: vec![],
        }
    }

    #[test]
    fn noop_always_succeeds() {
        assert!(NoopNotifier.send(&summary()).is_ok());
    }

    #[test]
    fn telegram_transport_error_is_reported() {
        // Nothing listens on this port; the send must fail cleanly.
        let notifier = TelegramNotifier::new("token".into(), "chat".into())
            .with_base_url("http://127.0.0.1:9");
        match notifier.send(&summary()) {
            Err(NotifyError::Transport(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn send_message_payload_shape() {
        let payload = SendMessage {
            chat_id: "42",
            text: "hello",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["chat_id"], "42");
        assert_eq!(json["text"], "hello");
    }
}
