//! Error types for capsule lifecycle and membership operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for capsule operations.
pub type Result<T> = std::result::Result<T, CapsuleError>;

/// Error taxonomy for the capsule subsystem.
///
/// Caller errors (lookup misses, authorization, preconditions) are terminal:
/// retrying the same request yields the same answer. Store, mail and blob
/// errors wrap the collaborator's message and are left to the caller to
/// retry or surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapsuleError {
    // ═══════════════════════════════════════════════════════════
    // Lookup & Authorization
    // ═══════════════════════════════════════════════════════════

    /// No capsule matches the given code or ID.
    #[error("Capsule not found")]
    NotFound,

    /// Caller is neither the owner nor a member of the capsule.
    #[error("User is not authorized to view this capsule")]
    Forbidden,

    /// Owner-only operation attempted by someone else.
    #[error("You are not the owner of the capsule")]
    NotOwner,

    /// User identities are positive; 0 is reserved for "no user".
    #[error("Invalid user id: {0}")]
    InvalidUserId(i64),

    // ═══════════════════════════════════════════════════════════
    // Membership
    // ═══════════════════════════════════════════════════════════

    /// Caller already occupies the owner slot or a member slot.
    #[error("You are already a member of the capsule")]
    AlreadyMember,

    /// Every member slot is taken.
    #[error("Capsule already has the maximum number of members")]
    CapsuleFull,

    // ═══════════════════════════════════════════════════════════
    // Validation
    // ═══════════════════════════════════════════════════════════

    /// Vessel is not one of the allowed presentation metaphors.
    #[error("Invalid vessel: {0}")]
    InvalidVessel(String),

    /// Date to open is not a `YYYY-MM-DD` calendar date.
    #[error("Invalid date to open the capsule: {0}")]
    InvalidDate(String),

    /// Capsule name is empty or too long.
    #[error("Invalid capsule name")]
    InvalidName,

    // ═══════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════

    /// Capsule has already been sealed (or opened).
    #[error("Capsule has already been sealed (or opened)")]
    AlreadySealed,

    /// Capsule is not currently sealed.
    #[error("Capsule is not currently sealed")]
    NotSealed,

    /// Open date has not been reached yet.
    #[error("Capsule cannot be opened before {date_to_open}")]
    TooEarly {
        /// When the capsule becomes openable
        date_to_open: DateTime<Utc>,
    },

    /// Capsule content is hidden while sealed.
    #[error("Capsule is sealed")]
    CapsuleSealed,

    // ═══════════════════════════════════════════════════════════
    // Code Generation
    // ═══════════════════════════════════════════════════════════

    /// No unused join code was found within the attempt budget.
    #[error("Failed to generate unique capsule code after {attempts} attempts")]
    CodeGenerationExhausted {
        /// Number of codes drawn
        attempts: u32,
    },

    /// Join code is already taken (unique constraint on insert).
    ///
    /// Consumed by the creation loop and never returned to callers.
    #[error("Capsule code already in use")]
    CodeTaken,

    // ═══════════════════════════════════════════════════════════
    // Collaborators
    // ═══════════════════════════════════════════════════════════

    /// Relational store failure.
    #[error("Store error: {0}")]
    StoreError(String),

    /// Mail transport rejected or failed to deliver the message.
    #[error("Failed to send email: {0}")]
    MailDeliveryFailed(String),

    /// Blob store failure.
    #[error("Blob store error: {0}")]
    BlobStoreError(String),
}

impl CapsuleError {
    /// Returns `true` if this error was caused by the request itself.
    ///
    /// # Examples
    ///
    /// ```
    /// # use time_capsule::CapsuleError;
    /// assert!(CapsuleError::CapsuleFull.is_user_error());
    /// assert!(!CapsuleError::StoreError("timeout".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        !self.is_retryable() && !matches!(self, Self::CodeGenerationExhausted { .. } | Self::CodeTaken)
    }

    /// Returns `true` if a collaborator failed and the request may succeed later.
    ///
    /// # Examples
    ///
    /// ```
    /// # use time_capsule::CapsuleError;
    /// assert!(CapsuleError::MailDeliveryFailed("421".into()).is_retryable());
    /// assert!(!CapsuleError::NotOwner.is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreError(_) | Self::MailDeliveryFailed(_) | Self::BlobStoreError(_)
        )
    }
}
