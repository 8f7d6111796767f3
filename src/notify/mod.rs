//! Notification dispatcher — routes a message to the user's channel.
//!
//! Each user gets exactly one chat transport, picked by `user.channel`.
//! Registration confirmations also go out as an email copy when a mailer is
//! configured; a failed copy is logged and ignored.

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use crate::channels::{Mailer, MessageSender, SmtpMailer, TelegramChannel, TwilioSender};
use crate::config::Settings;
use crate::error::ChannelError;
use crate::registration::messages::Messages;
use crate::users::{Channel, ReminderOffset, User};

/// What is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    RegistrationConfirmation,
    EventReminder(ReminderOffset),
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RegistrationConfirmation => f.write_str("registration_confirmation"),
            Self::EventReminder(offset) => write!(f, "reminder_{offset}"),
        }
    }
}

pub struct Dispatcher {
    telegram: Option<Arc<dyn MessageSender>>,
    whatsapp: Option<Arc<dyn MessageSender>>,
    mailer: Option<Arc<dyn Mailer>>,
    messages: Messages,
    timeout: Duration,
}

impl Dispatcher {
    /// A dispatcher with no transports; add them with the `with_*` builders.
    pub fn new(messages: Messages, timeout: Duration) -> Self {
        Self {
            telegram: None,
            whatsapp: None,
            mailer: None,
            messages,
            timeout,
        }
    }

    /// Wire up every transport that has credentials in `settings`.
    ///
    /// The Telegram channel is passed in because the webhook server also
    /// polls with it.
    pub fn from_settings(settings: &Settings, telegram: Option<Arc<TelegramChannel>>) -> Self {
        let messages = Messages::new(settings.event.clone(), settings.admin.clone());
        let mut dispatcher = Self::new(messages, settings.notify_timeout);

        if let Some(telegram) = telegram {
            dispatcher = dispatcher.with_telegram(telegram);
        }
        if let Some(twilio) = settings.twilio.clone() {
            dispatcher = dispatcher.with_whatsapp(Arc::new(TwilioSender::new(twilio)));
        }
        if let Some(smtp) = settings.smtp.clone() {
            dispatcher = dispatcher.with_mailer(Arc::new(SmtpMailer::new(smtp)));
        }
        dispatcher
    }

    pub fn with_telegram(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.telegram = Some(sender);
        self
    }

    pub fn with_whatsapp(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.whatsapp = Some(sender);
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    /// Deliver a notification. Returns `true` only if the chat transport
    /// accepted the message within the timeout.
    pub async fn send(&self, user: &User, kind: NotificationKind) -> bool {
        let body = match kind {
            NotificationKind::RegistrationConfirmation => {
                self.send_email_copy(user).await;
                self.messages.confirmation_notice(user)
            }
            NotificationKind::EventReminder(offset) => self.messages.reminder(offset),
        };

        let transport = match user.channel {
            Channel::Telegram => self.telegram.as_ref(),
            Channel::WhatsApp => self.whatsapp.as_ref(),
        };
        let Some(transport) = transport else {
            let err = ChannelError::NotConfigured {
                name: user.channel.to_string(),
            };
            tracing::warn!(user_id = %user.id, %kind, "Notification not sent: {err}");
            return false;
        };

        let result =
            tokio::time::timeout(self.timeout, transport.send_text(&user.external_id, &body))
                .await;

        match result {
            Ok(Ok(())) => {
                tracing::info!(user_id = %user.id, channel = %user.channel, %kind, "Notification delivered");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(user_id = %user.id, %kind, "Notification failed: {e}");
                false
            }
            Err(_) => {
                let err = ChannelError::Timeout {
                    name: transport.name().to_string(),
                    timeout: self.timeout,
                };
                tracing::warn!(user_id = %user.id, %kind, "Notification failed: {err}");
                false
            }
        }
    }

    async fn send_email_copy(&self, user: &User) {
        let Some(mailer) = &self.mailer else {
            return;
        };
        if user.email.is_empty() {
            return;
        }

        let subject = self.messages.confirmation_subject();
        let body = self.messages.confirmation_notice(user);
        match tokio::time::timeout(self.timeout, mailer.send_email(&user.email, &subject, &body))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(user_id = %user.id, "Confirmation email failed: {e}"),
            Err(_) => tracing::warn!(user_id = %user.id, "Confirmation email timed out"),
        }
    }
}
