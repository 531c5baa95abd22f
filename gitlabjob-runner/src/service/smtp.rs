//! SMTP delivery
//!
//! Sends notifications through a STARTTLS relay, with credentials when both
//! user and password are configured. Notifications carrying HTML are sent as
//! `multipart/alternative`; the rest as plain text.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, warn};

use crate::config::SmtpSettings;
use crate::service::notifier::{Notification, Notifier};

/// Submission port used when the server has none
pub const DEFAULT_SMTP_PORT: u16 = 587;

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(settings: &SmtpSettings, from: &str) -> Result<Self> {
        let from = from
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid sender address '{}'", from))?;
        let (host, port) = split_server_port(&settings.server)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host)
            .with_context(|| format!("Failed to set up SMTP relay {}", host))?
            .port(port);

        match (&settings.user, &settings.pass) {
            (Some(user), Some(pass)) => {
                builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
            }
            _ => warn!("Proceeding with unauthenticated SMTP connection"),
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let Some(message) = build_message(&self.from, notification)? else {
            warn!(
                "No valid recipient for '{}', notification dropped",
                notification.subject
            );
            return Ok(());
        };

        self.transport
            .send(message)
            .await
            .context("Failed to send mail")?;

        debug!(
            "Mail '{}' sent to {} recipient(s)",
            notification.subject,
            notification.recipients.len()
        );
        Ok(())
    }
}

/// Builds the mail for a notification, `None` when no recipient is valid
///
/// A notification carrying HTML becomes a `multipart/alternative` message
/// with the plain-text body first.
fn build_message(from: &Mailbox, notification: &Notification) -> Result<Option<Message>> {
    let mut builder = Message::builder()
        .from(from.clone())
        .subject(notification.subject.clone());

    let mut addressed = 0;
    for recipient in &notification.recipients {
        match recipient.parse::<Mailbox>() {
            Ok(mailbox) => {
                builder = builder.to(mailbox);
                addressed += 1;
            }
            Err(e) => warn!("Skipping invalid recipient '{}': {}", recipient, e),
        }
    }

    if addressed == 0 {
        return Ok(None);
    }

    let message = match &notification.html {
        Some(html) => builder.multipart(MultiPart::alternative_plain_html(
            notification.body.clone(),
            html.clone(),
        )),
        None => builder
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone()),
    }
    .context("Failed to build mail message")?;

    Ok(Some(message))
}

/// Splits `host[:port]`, defaulting to the submission port
fn split_server_port(server: &str) -> Result<(String, u16)> {
    let server = server.trim();
    match server.split_once(':') {
        None if !server.is_empty() => Ok((server.to_string(), DEFAULT_SMTP_PORT)),
        Some((host, port)) if !host.is_empty() => {
            let port = port
                .parse::<u16>()
                .with_context(|| format!("Invalid SMTP port in '{}'", server))?;
            Ok((host.to_string(), port))
        }
        _ => anyhow::bail!("Invalid SMTP server '{}'", server),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_server_port() {
        assert_eq!(
            split_server_port(" mail.server.com:25 ").unwrap(),
            ("mail.server.com".to_string(), 25)
        );
        assert_eq!(
            split_server_port("mail.server.com").unwrap(),
            ("mail.server.com".to_string(), DEFAULT_SMTP_PORT)
        );
        assert!(split_server_port("mail.server.com:smtp").is_err());
        assert!(split_server_port("a:b:c").is_err());
        assert!(split_server_port("").is_err());
        assert!(split_server_port(":25").is_err());
    }

    fn notification(recipients: &[&str], html: Option<&str>) -> Notification {
        Notification {
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
            subject: "[GitlabJob] Status do job 42".to_string(),
            body: "job_id: 42\ninicio: OK\n".to_string(),
            html: html.map(str::to_string),
        }
    }

    fn sender() -> Mailbox {
        "gitlabjob@mail.com".parse().unwrap()
    }

    #[test]
    fn test_html_becomes_alternative_part() {
        let message = build_message(
            &sender(),
            &notification(&["ops@example.com"], Some("<p>inicio: <b>OK</b></p>")),
        )
        .unwrap()
        .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("inicio: <b>OK</b>"));
    }

    #[test]
    fn test_plain_message_without_html() {
        let message = build_message(&sender(), &notification(&["ops@example.com"], None))
            .unwrap()
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("text/plain"));
        assert!(!raw.contains("multipart"));
    }

    #[test]
    fn test_no_valid_recipient_builds_nothing() {
        let message = build_message(&sender(), &notification(&["not an address"], None)).unwrap();
        assert!(message.is_none());
    }

    #[test]
    fn test_invalid_sender_is_rejected() {
        let settings = SmtpSettings {
            server: "mail.server.com".to_string(),
            user: None,
            pass: None,
        };
        assert!(SmtpNotifier::new(&settings, "not an address").is_err());
    }
}
