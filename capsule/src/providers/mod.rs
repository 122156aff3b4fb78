//! Capsule providers.
//!
//! Traits for every external dependency of the capsule subsystem. The
//! service and the dispatcher are generic over them; production wires in
//! [`crate::stores::postgres`] and [`SmtpMailTransport`], tests wire in
//! [`crate::mocks`].
//!
//! ```text
//! CapsuleService ──► CapsuleRepository ──► capsules, capsule_members, content tables
//!        │
//!        └─────────► BlobStore (object names handed back by deletion)
//!
//! ReminderDispatcher ──► CapsuleRepository (due_reminders / mark_reminders_sent)
//!                   └──► MailTransport
//! ```
//!
//! Every multi-step mutation on [`CapsuleRepository`] is atomic in the
//! implementation: callers never see a half-joined member or a capsule
//! whose content was only partly removed.

use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::state::{Capsule, CapsuleId, NewCapsule, ReminderTarget, SealedState, UserId};
use chrono::{DateTime, Utc};

pub mod blob;
pub mod console_mail;
pub mod mail;
#[cfg(feature = "smtp")]
pub mod smtp_mail;

pub use blob::{BlobStore, StoredObject};
pub use console_mail::ConsoleMailTransport;
pub use mail::MailTransport;
#[cfg(feature = "smtp")]
pub use smtp_mail::SmtpMailTransport;

/// Capsule repository.
///
/// Reads return snapshots with members ordered by slot. Writes that depend on
/// the current state take the expected state as a parameter and report
/// whether they applied, so a lost race is visible to the caller.
pub trait CapsuleRepository: Send + Sync {
    /// Whether any capsule already uses `code`.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    fn code_exists(&self, code: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Insert a new capsule in the `Preseal` state.
    ///
    /// # Errors
    ///
    /// - [`crate::CapsuleError::CodeTaken`]: the code was taken concurrently
    /// - [`crate::CapsuleError::StoreError`]: the store is unavailable
    fn insert_capsule(
        &self,
        capsule: NewCapsule,
    ) -> impl std::future::Future<Output = Result<CapsuleId>> + Send;

    /// Load a capsule by ID.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    fn find_by_id(
        &self,
        id: CapsuleId,
    ) -> impl std::future::Future<Output = Result<Option<Capsule>>> + Send;

    /// Load a capsule by join code.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    fn find_by_code(
        &self,
        code: &str,
    ) -> impl std::future::Future<Output = Result<Option<Capsule>>> + Send;

    /// Every capsule `user_id` owns or is a member of, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    fn list_for_user(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<Vec<Capsule>>> + Send;

    /// Atomically add `user_id` to the capsule with `code`.
    ///
    /// Implementations hold an exclusive section over the capsule while they
    /// call [`crate::membership::assign_slot`] and insert the member row.
    ///
    /// # Errors
    ///
    /// - [`crate::CapsuleError::NotFound`]: no capsule has `code`
    /// - [`crate::CapsuleError::AlreadyMember`] / [`crate::CapsuleError::CapsuleFull`]
    /// - [`crate::CapsuleError::StoreError`]: the store is unavailable
    fn add_member(
        &self,
        code: &str,
        user_id: UserId,
        max_slots: u8,
        joined_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u8>> + Send;

    /// Flag `user_id`'s membership as sealed while the capsule is still `Preseal`.
    ///
    /// Returns `false` if the capsule is no longer `Preseal` or the user is
    /// not a member.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    fn set_member_sealed(
        &self,
        id: CapsuleId,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Rename a capsule owned by `owner_id`.
    ///
    /// Returns `false` if nothing matched.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    fn rename(
        &self,
        id: CapsuleId,
        owner_id: UserId,
        name: &str,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Compare-and-set the lifecycle of a capsule owned by `owner_id`.
    ///
    /// Applies only if the persisted state is still `from`. Returns whether
    /// the update applied.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    fn update_lifecycle(
        &self,
        id: CapsuleId,
        owner_id: UserId,
        from: SealedState,
        to: Lifecycle,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Delete a capsule owned by `owner_id` together with its content and members.
    ///
    /// Returns the blob object names referenced by the deleted content rows.
    /// Deletes nothing and returns an empty list if the capsule does not
    /// exist or is owned by someone else.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable; nothing is deleted then.
    fn delete_capsule(
        &self,
        id: CapsuleId,
        owner_id: UserId,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;

    /// Sealed capsules past their open date whose reminder has not gone out,
    /// paired with the owner's email, ordered by capsule ID.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    fn due_reminders(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<ReminderTarget>>> + Send;

    /// Set `reminder_email_sent` on `ids` that still match the due predicate.
    ///
    /// Returns the number of capsules updated.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    fn mark_reminders_sent(
        &self,
        now: DateTime<Utc>,
        ids: &[CapsuleId],
    ) -> impl std::future::Future<Output = Result<u64>> + Send;
}
