// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outbound mail over SMTP.
//!
//! A transport is built for each send from the current [`SmtpConfig`]; no
//! connection is held between requests.

use crate::config::SmtpConfig;
use crate::error::{MailError, MailResult};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};
use uuid::Uuid;

/// A validated message ready to be relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    /// Bodies that look like markup are sent as HTML.
    pub fn is_html(&self) -> bool {
        self.body.contains('<') && self.body.contains("</")
    }
}

/// Sends messages, returning the Message-ID on success.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> MailResult<String>;
}

/// [`Mailer`] relaying through the configured SMTP server.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> MailResult<AsyncSmtpTransport<Tokio1Executor>> {
        let host = self
            .config
            .host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or(MailError::MissingHost)?;

        let params = TlsParameters::new(host.to_string())?;
        let tls = if self.config.secure {
            Tls::Wrapper(params)
        } else {
            Tls::Opportunistic(params)
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(self.config.port)
            .tls(tls);
        if let Some((user, pass)) = self.config.credentials() {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        debug!(
            host = %host,
            port = self.config.port,
            secure = self.config.secure,
            auth = self.config.credentials().is_some(),
            "Created SMTP transport"
        );
        Ok(builder.build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> MailResult<String> {
        let (message, message_id) = build_message(email)?;
        let transport = self.transport()?;

        debug!(
            from = %email.from,
            recipients = email.to.len(),
            subject = %email.subject,
            html = email.is_html(),
            "Sending email"
        );
        let response = transport.send(message).await?;
        info!(message_id = %message_id, code = %response.code(), "Email sent");

        Ok(message_id)
    }
}

fn parse_mailbox(address: &str) -> MailResult<Mailbox> {
    address
        .parse::<Mailbox>()
        .map_err(|e| MailError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

/// Build the MIME message and its generated Message-ID.
pub fn build_message(email: &OutgoingEmail) -> MailResult<(Message, String)> {
    let from = parse_mailbox(&email.from)?;
    let message_id = format!("<{}@{}>", Uuid::new_v4(), from.email.domain());

    let mut builder = Message::builder()
        .from(from)
        .subject(email.subject.as_str())
        .message_id(Some(message_id.clone()));
    for to in &email.to {
        builder = builder.to(parse_mailbox(to)?);
    }

    let content_type = if email.is_html() {
        ContentType::TEXT_HTML
    } else {
        ContentType::TEXT_PLAIN
    };
    let message = builder.header(content_type).body(email.body.clone())?;

    Ok((message, message_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(body: &str, to: &[&str]) -> OutgoingEmail {
        OutgoingEmail {
            from: "sender@example.com".to_string(),
            to: to.iter().map(|s| s.to_string()).collect(),
            subject: "Greetings".to_string(),
            body: body.to_string(),
        }
    }

    fn formatted(message: &Message) -> String {
        String::from_utf8_lossy(&message.formatted()).into_owned()
    }

    #[test]
    fn test_html_detection() {
        assert!(email("<p>Hello</p>", &[]).is_html());
        assert!(!email("a < b", &[]).is_html());
        assert!(!email("plain text", &[]).is_html());
    }

    #[test]
    fn test_build_plain_message() {
        let (message, id) = build_message(&email("plain text", &["a@example.org"])).unwrap();
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@example.com>"));

        let raw = formatted(&message);
        assert!(raw.contains("Content-Type: text/plain"));
        assert!(raw.contains(&id));
        assert!(raw.contains("To: a@example.org"));
    }

    #[test]
    fn test_build_html_message_multiple_recipients() {
        let (message, _) =
            build_message(&email("<b>hi</b>", &["a@example.org", "b@example.org"])).unwrap();
        assert_eq!(message.envelope().to().len(), 2);
        assert!(formatted(&message).contains("Content-Type: text/html"));
    }

    #[test]
    fn test_invalid_recipient() {
        let result = build_message(&email("x", &["not an address"]));
        assert!(matches!(result, Err(MailError::InvalidAddress { .. })));
    }

    #[tokio::test]
    async fn test_missing_host() {
        let mailer = SmtpMailer::new(SmtpConfig::default());
        let result = mailer.send(&email("x", &["a@example.org"])).await;
        assert!(matches!(result, Err(MailError::MissingHost)));
    }
}
