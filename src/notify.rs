//! Outbound notification sink.
//!
//! Delivery is best-effort: [`Notifier::notify`] never returns an error, it
//! logs and moves on. The coordinator marks a record as seen whether or not
//! the message went out.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use crate::utils::truncate_for_log;

pub const TELEGRAM_API: &str = "https://api.telegram.org";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Telegram Bot API `sendMessage` sink.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: Option<String>,
    chat_id: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    /// Credentials may be absent; sends are then skipped with a warning.
    pub fn new(token: Option<String>, chat_id: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: TELEGRAM_API.to_string(),
            token: token.filter(|t| !t.is_empty()),
            chat_id: chat_id.filter(|c| !c.is_empty()),
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.chat_id.is_some()
    }

    async fn send(&self, token: &str, chat_id: &str, text: &str) -> Result<(), reqwest::Error> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, token);
        self.client
            .post(url)
            .timeout(self.timeout)
            .json(&SendMessage {
                chat_id,
                text,
                disable_web_page_preview: true,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(level = "info", skip_all)]
    async fn notify(&self, message: &str) {
        let (Some(token), Some(chat_id)) = (&self.token, &self.chat_id) else {
            warn!("Telegram credentials missing; message skipped");
            return;
        };
        match self.send(token, chat_id, message).await {
            Ok(()) => debug!(preview = %truncate_for_log(message, 60), "Telegram message sent"),
            // The error's URL would contain the bot token; log only the status.
            Err(e) => error!(
                status = ?e.status(),
                timeout = e.is_timeout(),
                "Telegram send error"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_sends_message_without_preview() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .match_body(Matcher::Json(serde_json::json!({
                "chat_id": "42",
                "text": "📢 BUYER • OLX\nCumpăr macese\n-\nhttps://www.olx.ro/d/x",
                "disable_web_page_preview": true
            })))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let notifier = TelegramNotifier::new(Some("TOKEN".into()), Some("42".into()))
            .with_api_base(server.url());
        notifier
            .notify("📢 BUYER • OLX\nCumpăr macese\n-\nhttps://www.olx.ro/d/x")
            .await;
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_credentials_skip_the_call() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let notifier = TelegramNotifier::new(Some("TOKEN".into()), None).with_api_base(server.url());
        assert!(!notifier.is_configured());
        notifier.notify("hello").await;
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delivery_errors_are_swallowed() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .with_status(500)
            .create_async()
            .await;

        let notifier = TelegramNotifier::new(Some("TOKEN".into()), Some("42".into()))
            .with_api_base(server.url());
        notifier.notify("hello").await;
        mock.assert_async().await;
    }
}
