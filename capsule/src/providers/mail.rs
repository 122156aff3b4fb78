//! Mail transport trait.

use crate::error::Result;

/// Outbound mail.
pub trait MailTransport: Send + Sync {
    /// Send one message to every address in `recipients`.
    ///
    /// Recipients should not see each other's addresses.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CapsuleError::MailDeliveryFailed`] if the message was
    /// not accepted for delivery.
    fn send_mail(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
