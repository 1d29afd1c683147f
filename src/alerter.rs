use teloxide::{Bot, prelude::Requester, types::ChatId};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("telegram request failed: {0}")]
    Telegram(#[from] teloxide::RequestError),
}

/// Delivery channel for the aggregated run report. One message per run;
/// delivery failure is not retried within the run.
#[async_trait::async_trait]
pub trait Notifier {
    async fn send_report(&self, report: &str) -> Result<(), AlertError>;
}

#[derive(Clone)]
pub struct TelegramAlerter {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramAlerter {
    pub fn new(bot_token: String, chat_id: i64) -> Self {
        Self {
            bot: Bot::new(bot_token),
            chat_id: ChatId(chat_id),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramAlerter {
    async fn send_report(&self, report: &str) -> Result<(), AlertError> {
        self.bot.send_message(self.chat_id, report).await?;
        Ok(())
    }
}

/// Test-mode wiring: logs the report instead of delivering it, leaving
/// every check unaffected.
#[derive(Debug, Default, Clone)]
pub struct DryRunAlerter;

#[async_trait::async_trait]
impl Notifier for DryRunAlerter {
    async fn send_report(&self, report: &str) -> Result<(), AlertError> {
        info!(report, "test mode active, skipping telegram delivery");
        Ok(())
    }
}
