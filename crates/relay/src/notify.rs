//! Delivery notifications
//!
//! One-way boundary to the chat layer: the ingestion engine emits an
//! intent per newly stored message and never learns whether delivery
//! succeeded. Failures are logged here and discarded; they must not
//! roll back the committed insert or stall the batch.

use crate::models::{AccountId, MessageId};

/// "Deliver this message to this account" intent
#[derive(Debug, Clone)]
pub struct NotificationIntent {
    /// Owning account, doubling as the chat destination
    pub account: AccountId,
    /// The alias address the mail arrived at
    pub alias_address: String,
    /// Sender display string
    pub sender: String,
    pub subject: String,
    /// Reference usable to retrieve the full message later
    pub message_id: MessageId,
}

/// Boundary to the external chat layer; fire-and-forget
pub trait Notifier: Send + Sync {
    fn notify(&self, intent: NotificationIntent);
}

/// Notifier that only logs; useful when no chat transport is configured
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, intent: NotificationIntent) {
        log::info!(
            "[NOTIFY] New mail for account {} at {}: {} / {}",
            intent.account.as_i64(),
            intent.alias_address,
            intent.sender,
            intent.subject
        );
    }
}

/// Notifier that posts to the Telegram Bot API
///
/// Uses synchronous HTTP (ureq) to be executor-agnostic; the poll
/// worker thread is the only caller.
pub struct TelegramNotifier {
    bot_token: String,
}

impl TelegramNotifier {
    const BASE_URL: &'static str = "https://api.telegram.org";

    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
        }
    }

    fn send(&self, intent: &NotificationIntent) -> anyhow::Result<()> {
        let url = format!("{}/bot{}/sendMessage", Self::BASE_URL, self.bot_token);
        let text = format!(
            "\u{1F514} New mail at {}\n\nFrom: {}\nSubject: {}",
            intent.alias_address, intent.sender, intent.subject
        );

        ureq::post(&url)
            .send_json(serde_json::json!({
                "chat_id": intent.account.as_i64(),
                "text": text,
            }))
            .map_err(|e| anyhow::anyhow!("Failed to send Telegram notification: {e}"))?;

        Ok(())
    }
}

impl Notifier for TelegramNotifier {
    fn notify(&self, intent: NotificationIntent) {
        // Best-effort: a blocked or unreachable destination only logs
        if let Err(e) = self.send(&intent) {
            log::warn!(
                "[NOTIFY] Dropping notification for account {}: {e:#}",
                intent.account.as_i64()
            );
        }
    }
}
