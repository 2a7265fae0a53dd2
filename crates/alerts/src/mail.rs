//! Email delivery through an HTTP mail relay.
//!
//! The tracker does not speak SMTP itself; it posts the composed message
//! to a relay endpoint that owns the actual transport.

use crate::channel::{DeliveryError, EmailChannel};
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

pub struct MailRelayChannel {
    client: reqwest::Client,
    endpoint: String,
    from: String,
}

impl MailRelayChannel {
    pub fn new(endpoint: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl EmailChannel for MailRelayChannel {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: &str,
    ) -> Result<(), DeliveryError> {
        let message = RelayMessage {
            from: &self.from,
            to,
            subject,
            text,
            html,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&message)
            .send()
            .await
            .map_err(|e| DeliveryError::Email(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DeliveryError::Email(format!(
                "relay returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn relay_message_serializes_all_fields() {
        let message = RelayMessage {
            from: "tracker@example.com",
            to: "user@example.com",
            subject: "Incoming transaction on QACC",
            text: "plain",
            html: "<p>rich</p>",
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["from"], "tracker@example.com");
        assert_eq!(json["to"], "user@example.com");
        assert_eq!(json["subject"], "Incoming transaction on QACC");
        assert_eq!(json["text"], "plain");
        assert_eq!(json["html"], "<p>rich</p>");
    }
}
