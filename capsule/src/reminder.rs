//! "Your capsule is ready" reminders.
//!
//! [`ReminderDispatcher::dispatch`] handles one batch. It has no timer of
//! its own; the `capsule-reminders` binary or any other scheduler calls it
//! periodically.
//!
//! Delivery is at-least-once: the flag is set only after the mail transport
//! accepted the message, so a crash between the two sends the reminder again
//! on the next run.

use crate::config::ReminderConfig;
use crate::environment::Clock;
use crate::error::Result;
use crate::providers::{CapsuleRepository, MailTransport};
use crate::state::{CapsuleId, ReminderTarget};
use std::collections::HashSet;

/// Summary of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderReport {
    /// Capsules whose reminder flag was set.
    pub capsules_marked: u64,

    /// Distinct addresses the mail went to.
    pub recipients: usize,
}

/// Sends reminders for sealed capsules whose open date has passed.
#[derive(Debug, Clone)]
pub struct ReminderDispatcher<R, M, C> {
    repository: R,
    mail: M,
    clock: C,
    config: ReminderConfig,
}

impl<R, M, C> ReminderDispatcher<R, M, C>
where
    R: CapsuleRepository,
    M: MailTransport,
    C: Clock,
{
    /// Create a dispatcher.
    #[must_use]
    pub const fn new(repository: R, mail: M, clock: C, config: ReminderConfig) -> Self {
        Self {
            repository,
            mail,
            clock,
            config,
        }
    }

    /// Send one batch of reminders and mark the batch's capsules.
    ///
    /// # Errors
    ///
    /// - [`crate::CapsuleError::MailDeliveryFailed`]: nothing was marked
    /// - [`crate::CapsuleError::StoreError`]: selecting or marking failed
    pub async fn dispatch(&self) -> Result<ReminderReport> {
        let now = self.clock.now();
        let targets = self.repository.due_reminders(now, self.config.batch_size).await?;

        if targets.is_empty() {
            tracing::debug!("No capsules due for a reminder");
            return Ok(ReminderReport::default());
        }

        let recipients = unique_recipients(&targets);
        self.mail
            .send_mail(&recipients, &self.config.subject, &self.config.body)
            .await
            .inspect_err(|e| {
                tracing::warn!(capsules = targets.len(), error = %e, "Reminder mail failed; batch left unmarked");
            })?;

        let ids: Vec<CapsuleId> = targets.iter().map(|target| target.capsule_id).collect();
        let capsules_marked = self.repository.mark_reminders_sent(now, &ids).await?;

        tracing::info!(
            capsules_marked,
            recipients = recipients.len(),
            "Reminder batch sent"
        );

        Ok(ReminderReport {
            capsules_marked,
            recipients: recipients.len(),
        })
    }
}

/// Distinct recipient addresses in first-seen order.
#[must_use]
pub fn unique_recipients(targets: &[ReminderTarget]) -> Vec<String> {
    let mut seen = HashSet::new();
    targets
        .iter()
        .filter(|target| seen.insert(target.email.as_str()))
        .map(|target| target.email.clone())
        .collect()
}
