//! Best-effort notifications about borrowings

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use super::email::EmailService;
use crate::{
    config::{EmailConfig, NotificationChannel, NotificationsConfig},
    error::{AppError, AppResult},
};

const TELEGRAM_API: &str = "https://api.telegram.org";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> AppResult<()>;
}

/// Posts messages to a Telegram chat through the Bot API
pub struct TelegramNotifier {
    client: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, bot_token, chat_id })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, text: &str) -> AppResult<()> {
        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API, self.bot_token);
        let params = [("chat_id", self.chat_id.as_str()), ("text", text)];

        let response = self
            .client
            .post(url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Telegram request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "Telegram returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Mails every message to a fixed recipient
pub struct EmailNotifier {
    email: EmailService,
    to: String,
}

impl EmailNotifier {
    pub fn new(email: EmailService, to: String) -> Self {
        Self { email, to }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, text: &str) -> AppResult<()> {
        self.email.send_notification(&self.to, text).await
    }
}

/// Writes messages to the log only
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, text: &str) -> AppResult<()> {
        tracing::info!(target: "notifications", "{}", text);
        Ok(())
    }
}

/// Fire-and-forget front for a [`Notifier`]
#[derive(Clone)]
pub struct NotificationService {
    notifier: Arc<dyn Notifier>,
}

impl NotificationService {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Pick the notifier for the configured channel.
    ///
    /// A channel missing its credentials falls back to the log.
    pub fn from_config(config: &NotificationsConfig, email: &EmailConfig) -> AppResult<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let notifier: Arc<dyn Notifier> = match config.channel {
            NotificationChannel::Telegram => match (&config.telegram_bot_token, &config.telegram_chat_id) {
                (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
                    Arc::new(TelegramNotifier::new(token.clone(), chat_id.clone(), timeout)?)
                }
                _ => {
                    tracing::warn!("Telegram notifications selected without bot token or chat id, logging instead");
                    Arc::new(LogNotifier)
                }
            },
            NotificationChannel::Email => match &config.email_to {
                Some(to) if !to.is_empty() => {
                    Arc::new(EmailNotifier::new(EmailService::new(email.clone()), to.clone()))
                }
                _ => {
                    tracing::warn!("Email notifications selected without recipient, logging instead");
                    Arc::new(LogNotifier)
                }
            },
            NotificationChannel::Log => Arc::new(LogNotifier),
        };

        Ok(Self::new(notifier))
    }

    /// Send `text` on a detached task; failures are logged and dropped
    pub fn dispatch(&self, text: String) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&text).await {
                tracing::warn!("Notification not delivered: {}", e);
            }
        });
    }
}
