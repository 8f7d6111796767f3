//! SMTP mailer for registration confirmation copies, via lettre.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use crate::channels::Mailer;
use crate::config::SmtpConfig;
use crate::error::ChannelError;

pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), ChannelError> {
        let email = build_message(&self.config.from_address, to, subject, body)?;
        let config = self.config.clone();

        // lettre's SmtpTransport is blocking.
        tokio::task::spawn_blocking(move || send_blocking(&config, &email))
            .await
            .map_err(|e| send_failed(format!("SMTP task panicked: {e}")))??;

        tracing::info!(to, "Confirmation email sent");
        Ok(())
    }
}

fn send_failed(reason: String) -> ChannelError {
    ChannelError::SendFailed {
        name: "email".into(),
        reason,
    }
}

/// Build a UTF-8 plain-text message.
fn build_message(from: &str, to: &str, subject: &str, body: &str) -> Result<Message, ChannelError> {
    Message::builder()
        .from(
            from.parse()
                .map_err(|e| send_failed(format!("Invalid from address: {e}")))?,
        )
        .to(to
            .parse()
            .map_err(|e| send_failed(format!("Invalid to address: {e}")))?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| send_failed(format!("Failed to build email: {e}")))
}

/// Implicit-TLS relay (port 465 by default) with login credentials.
fn send_blocking(config: &SmtpConfig, email: &Message) -> Result<(), ChannelError> {
    let creds = Credentials::new(
        config.username.clone(),
        config.password.expose_secret().to_string(),
    );

    let transport = SmtpTransport::relay(&config.host)
        .map_err(|e| send_failed(format!("SMTP relay error: {e}")))?
        .port(config.port)
        .credentials(creds)
        .build();

    transport
        .send(email)
        .map_err(|e| send_failed(format!("SMTP send failed: {e}")))?;
    Ok(())
}
