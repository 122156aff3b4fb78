//! SMTP mail transport using Lettre.

use crate::config::SmtpConfig;
use crate::error::{CapsuleError, Result};
use crate::providers::MailTransport;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, warn};

/// SMTP mail transport.
///
/// Recipients go in `Bcc`; the visible `To` is the sender itself.
///
/// # Examples
///
/// ```ignore
/// use time_capsule::providers::SmtpMailTransport;
///
/// let transport = SmtpMailTransport::new(
///     "smtp.gmail.com".to_string(),
///     587,
///     "user@gmail.com".to_string(),
///     "app_password".to_string(),
///     "noreply@example.com".to_string(),
///     "Time Capsule".to_string(),
/// )?;
/// ```
#[derive(Clone)]
pub struct SmtpMailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailTransport {
    /// Create a transport relaying through `smtp_server` with STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns [`CapsuleError::MailDeliveryFailed`] if the relay or the
    /// sender address is invalid.
    pub fn new(
        smtp_server: String,
        smtp_port: u16,
        smtp_username: String,
        smtp_password: String,
        from_email: String,
        from_name: String,
    ) -> Result<Self> {
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp_server)
            .map_err(|e| CapsuleError::MailDeliveryFailed(format!("SMTP relay error: {e}")))?
            .port(smtp_port)
            .credentials(Credentials::new(smtp_username, smtp_password))
            .build();

        let from = format!("{from_name} <{from_email}>")
            .parse()
            .map_err(|e| CapsuleError::MailDeliveryFailed(format!("Invalid from address: {e}")))?;

        Ok(Self { mailer, from })
    }

    /// Create a transport from process configuration.
    ///
    /// # Errors
    ///
    /// See [`SmtpMailTransport::new`].
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        Self::new(
            config.host.clone(),
            config.port,
            config.username.clone(),
            config.password.clone(),
            config.from_email.clone(),
            config.from_name.clone(),
        )
    }

    /// Build the message, skipping recipients that are not valid addresses.
    ///
    /// Returns `None` when no valid recipient remains.
    fn build_message(&self, recipients: &[String], subject: &str, body: &str) -> Result<Option<Message>> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(self.from.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);

        let mut accepted = 0;
        for recipient in recipients {
            match recipient.parse::<Mailbox>() {
                Ok(mailbox) => {
                    builder = builder.bcc(mailbox);
                    accepted += 1;
                }
                Err(e) => warn!(recipient = %recipient, error = %e, "Skipping invalid recipient"),
            }
        }
        if accepted == 0 {
            return Ok(None);
        }

        builder
            .body(body.to_string())
            .map(Some)
            .map_err(|e| CapsuleError::MailDeliveryFailed(format!("Failed to build email: {e}")))
    }
}

impl MailTransport for SmtpMailTransport {
    async fn send_mail(&self, recipients: &[String], subject: &str, body: &str) -> Result<()> {
        if recipients.is_empty() {
            return Ok(());
        }

        let Some(message) = self.build_message(recipients, subject, body)? else {
            warn!(recipients = recipients.len(), "No deliverable recipients; mail not sent");
            return Ok(());
        };

        self.mailer
            .send(message)
            .await
            .map_err(|e| CapsuleError::MailDeliveryFailed(e.to_string()))?;

        debug!(recipients = recipients.len(), "Reminder mail accepted by SMTP relay");
        Ok(())
    }
}
