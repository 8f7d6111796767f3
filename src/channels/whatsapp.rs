//! WhatsApp over Twilio — REST sender for outbound messages plus helpers for
//! the inbound webhook (form payload in, TwiML out).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::channels::MessageSender;
use crate::config::TwilioConfig;
use crate::error::ChannelError;

const ADDRESS_PREFIX: &str = "whatsapp:";

/// Sends WhatsApp messages through Twilio's Messages API.
pub struct TwilioSender {
    account_sid: String,
    auth_token: SecretString,
    from_number: String,
    client: reqwest::Client,
}

impl TwilioSender {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            account_sid: config.account_sid,
            auth_token: config.auth_token,
            from_number: config.phone_number,
            client: reqwest::Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        )
    }
}

#[async_trait]
impl MessageSender for TwilioSender {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ChannelError> {
        let from = format!("{ADDRESS_PREFIX}{}", self.from_number);
        let to = format!("{ADDRESS_PREFIX}{}", parse_sender(recipient));
        let form = [("From", from.as_str()), ("To", to.as_str()), ("Body", text)];

        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&form)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "whatsapp".into(),
                reason: e.to_string(),
            })?;

        // Twilio answers a queued message with 201 Created.
        if resp.status() != reqwest::StatusCode::CREATED {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "whatsapp".into(),
                reason: format!("Twilio returned {status}: {body}"),
            });
        }

        tracing::debug!(to = %to, "WhatsApp message queued");
        Ok(())
    }
}

// ── Inbound webhook ─────────────────────────────────────────────────

/// Form body Twilio posts to the webhook. Extra fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "From", default)]
    pub from: String,
}

/// Strip the `whatsapp:` address prefix, leaving the phone number.
pub fn parse_sender(from: &str) -> &str {
    let from = from.trim();
    from.strip_prefix(ADDRESS_PREFIX).unwrap_or(from)
}

/// Wrap a reply in a TwiML `<Response><Message>` document.
pub fn twiml_message(text: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        escape_xml(text)
    )
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> TwilioSender {
        TwilioSender::new(TwilioConfig {
            account_sid: "AC123".into(),
            auth_token: SecretString::from("secret".to_string()),
            phone_number: "+14155238886".into(),
        })
    }

    #[test]
    fn messages_url_contains_account() {
        assert_eq!(
            sender().messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[test]
    fn sender_prefix_is_stripped() {
        assert_eq!(parse_sender("whatsapp:+79998221277"), "+79998221277");
        assert_eq!(parse_sender("+79998221277"), "+79998221277");
    }

    #[test]
    fn twiml_escapes_markup() {
        let xml = twiml_message("Q&A <b>\"ok\"</b>");
        assert!(xml.ends_with(
            "<Response><Message>Q&amp;A &lt;b&gt;&quot;ok&quot;&lt;/b&gt;</Message></Response>"
        ));
    }

    #[test]
    fn twiml_keeps_cyrillic() {
        let xml = twiml_message("Спасибо!");
        assert!(xml.contains("<Message>Спасибо!</Message>"));
    }

    #[test]
    fn inbound_form_ignores_unknown_fields() {
        let msg: InboundMessage = serde_json::from_value(serde_json::json!({
            "Body": "привет",
            "From": "whatsapp:+79990001122",
            "MessageSid": "SM1",
        }))
        .unwrap();
        assert_eq!(msg.body, "привет");
        assert_eq!(parse_sender(&msg.from), "+79990001122");
    }
}
