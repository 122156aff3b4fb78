//! Mock mail transport for testing.

use crate::error::{CapsuleError, Result};
use crate::providers::MailTransport;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// A message captured by [`MockMailTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    /// Recipients, in the order given.
    pub recipients: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
}

/// Mock mail transport.
///
/// Records every accepted message. [`MockMailTransport::fail_with`] makes
/// subsequent sends fail without recording anything.
#[derive(Debug, Clone, Default)]
pub struct MockMailTransport {
    sent: Arc<Mutex<Vec<SentMail>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MockMailTransport {
    /// Create a new mock transport that accepts every message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail with `reason`, or succeed again with `None`.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn fail_with(&self, reason: Option<&str>) -> Result<()> {
        *self
            .failure
            .lock()
            .map_err(|_| CapsuleError::MailDeliveryFailed("Mutex lock failed".to_string()))? =
            reason.map(str::to_string);
        Ok(())
    }

    /// Messages accepted so far.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn sent(&self) -> Result<Vec<SentMail>> {
        Ok(self
            .sent
            .lock()
            .map_err(|_| CapsuleError::MailDeliveryFailed("Mutex lock failed".to_string()))?
            .clone())
    }
}

impl MailTransport for MockMailTransport {
    fn send_mail(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        let sent = Arc::clone(&self.sent);
        let failure = Arc::clone(&self.failure);
        let mail = SentMail {
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            body: body.to_string(),
        };

        async move {
            let failure = failure
                .lock()
                .map_err(|_| CapsuleError::MailDeliveryFailed("Mutex lock failed".to_string()))?
                .clone();
            if let Some(reason) = failure {
                return Err(CapsuleError::MailDeliveryFailed(reason));
            }

            sent.lock()
                .map_err(|_| CapsuleError::MailDeliveryFailed("Mutex lock failed".to_string()))?
                .push(mail);
            Ok(())
        }
    }
}
