//! Capsule state types.
//!
//! All types are `Clone` so stores can hand out snapshots freely.

use crate::error::{CapsuleError, Result};
use crate::lifecycle::Lifecycle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Identity of a registered user, as resolved by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl UserId {
    /// Wrap a raw user id.
    ///
    /// # Errors
    ///
    /// Returns [`CapsuleError::InvalidUserId`] for ids `<= 0`.
    pub fn new(raw: i64) -> Result<Self> {
        if raw <= 0 {
            return Err(CapsuleError::InvalidUserId(raw));
        }
        Ok(Self(raw))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned capsule identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CapsuleId(pub i64);

impl fmt::Display for CapsuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Enumerations
// ═══════════════════════════════════════════════════════════════════════

/// Presentation metaphor chosen at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vessel {
    /// A cardboard box.
    Box,
    /// A suitcase.
    Suitcase,
    /// A guitar case.
    #[serde(rename = "guitar case")]
    GuitarCase,
    /// A message in a bottle.
    Bottle,
    /// A shoe box.
    Shoe,
    /// A garbage bag.
    Garbage,
}

impl Vessel {
    /// Every allowed vessel.
    pub const ALL: [Self; 6] = [
        Self::Box,
        Self::Suitcase,
        Self::GuitarCase,
        Self::Bottle,
        Self::Shoe,
        Self::Garbage,
    ];

    /// Database/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Box => "box",
            Self::Suitcase => "suitcase",
            Self::GuitarCase => "guitar case",
            Self::Bottle => "bottle",
            Self::Shoe => "shoe",
            Self::Garbage => "garbage",
        }
    }

    /// Parse a vessel from its wire representation (exact match).
    ///
    /// # Errors
    ///
    /// Returns [`CapsuleError::InvalidVessel`] for anything else.
    pub fn parse(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|vessel| vessel.as_str() == s)
            .ok_or_else(|| CapsuleError::InvalidVessel(s.to_string()))
    }
}

/// Coarse lifecycle state, as persisted.
///
/// Ordered: `Preseal < Sealed < Opened`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SealedState {
    /// Content is editable.
    Preseal,
    /// Content is frozen until the open date.
    Sealed,
    /// Terminal; content is visible again.
    Opened,
}

impl SealedState {
    /// Convert state to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Preseal => "preseal",
            Self::Sealed => "sealed",
            Self::Opened => "opened",
        }
    }

    /// Parse state from database string.
    ///
    /// # Errors
    ///
    /// Returns [`CapsuleError::StoreError`] if the string doesn't match a known state.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "preseal" => Ok(Self::Preseal),
            "sealed" => Ok(Self::Sealed),
            "opened" => Ok(Self::Opened),
            _ => Err(CapsuleError::StoreError(format!("Invalid sealed state: {s}"))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Core State Types
// ═══════════════════════════════════════════════════════════════════════

/// A non-owner participant of a capsule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Member identity.
    pub user_id: UserId,

    /// 1-based join position.
    pub slot: u8,

    /// Set once the member confirms sealing.
    pub sealed: bool,

    /// When the member joined.
    pub joined_at: DateTime<Utc>,
}

/// A time capsule and its membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capsule {
    /// Capsule ID.
    pub id: CapsuleId,

    /// Join code shared with would-be members.
    pub code: String,

    /// Creator; authorizes destructive and state-changing operations.
    pub owner_id: UserId,

    /// Members ordered by slot.
    pub members: Vec<Member>,

    /// Presentation metaphor.
    pub vessel: Vessel,

    /// Display name.
    pub name: String,

    /// Visibility flag.
    pub public: bool,

    /// Seal state and open date.
    pub lifecycle: Lifecycle,

    /// Whether the "ready to open" reminder went out.
    pub reminder_email_sent: bool,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Capsule {
    /// Current coarse state.
    #[must_use]
    pub const fn state(&self) -> SealedState {
        self.lifecycle.state()
    }

    /// Open date, present once sealed.
    #[must_use]
    pub const fn date_to_open(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.date_to_open()
    }

    /// Whether `user_id` created this capsule.
    #[must_use]
    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }

    /// Membership of `user_id`, if any.
    #[must_use]
    pub fn member(&self, user_id: UserId) -> Option<&Member> {
        self.members.iter().find(|member| member.user_id == user_id)
    }

    /// Whether `user_id` is the owner or a member.
    #[must_use]
    pub fn is_participant(&self, user_id: UserId) -> bool {
        self.is_owner(user_id) || self.member(user_id).is_some()
    }
}

/// Row data for a capsule about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCapsule {
    /// Candidate join code.
    pub code: String,

    /// Creator.
    pub owner_id: UserId,

    /// Presentation metaphor.
    pub vessel: Vessel,

    /// Initial display name.
    pub name: String,

    /// Visibility flag.
    pub public: bool,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A due capsule paired with its owner's address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderTarget {
    /// Capsule whose open date has passed.
    pub capsule_id: CapsuleId,

    /// Owner's email address.
    pub email: String,
}
