use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::config::TelegramConfig;
use crate::error::{AppError, Result};

/// Outbound channel for formatted alerts. One call per message.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;

    fn name(&self) -> &'static str;
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

/// Telegram Bot API `sendMessage` with HTML parse mode.
pub struct TelegramNotifier {
    client: reqwest::Client,
    url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(cfg: &TelegramConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/bot{}/sendMessage", cfg.api_url.trim_end_matches('/'), cfg.token),
            chat_id: cfg.chat_id.clone(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
        };
        let resp = self.client.post(&self.url).json(&payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Notify {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

/// Writes alerts to the log instead of sending them. Used when no bot token is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        info!(event = "ALERT", "{text}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
