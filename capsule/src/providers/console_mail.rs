//! Console mail transport for development.

use crate::error::Result;
use crate::providers::MailTransport;
use tracing::info;

/// Logs outbound mail instead of sending it.
///
/// Used by `capsule-reminders` when no SMTP relay is configured.
#[derive(Clone, Debug, Default)]
pub struct ConsoleMailTransport;

impl ConsoleMailTransport {
    /// Create a new console mail transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MailTransport for ConsoleMailTransport {
    async fn send_mail(&self, recipients: &[String], subject: &str, body: &str) -> Result<()> {
        info!(
            recipients = ?recipients,
            subject = %subject,
            body = %body,
            "📧 Mail (development mode, not sent)"
        );
        Ok(())
    }
}
