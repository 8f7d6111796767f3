//! Outbound transports and inbound adapters for each messaging surface.

pub mod email;
pub mod telegram;
pub mod whatsapp;

use async_trait::async_trait;

use crate::error::ChannelError;

pub use email::SmtpMailer;
pub use telegram::TelegramChannel;
pub use whatsapp::TwilioSender;

/// Delivers a plain text message to one recipient on a chat platform.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Short channel name used in logs and errors.
    fn name(&self) -> &str;

    /// Send `text` to the channel-native `recipient` (chat id or phone number).
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ChannelError>;
}

/// Sends a plain-text email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), ChannelError>;
}
