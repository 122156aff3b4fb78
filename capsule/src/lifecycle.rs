//! Capsule lifecycle state machine.
//!
//! ```text
//!            seal(date)               open() && now >= date
//! Preseal ───────────────► Sealed ─────────────────────────► Opened
//! ```
//!
//! [`Lifecycle`] carries the open date inside the variants that have one, so
//! "`date_to_open` is set iff sealed or opened" holds by construction. Every
//! transition goes through [`Lifecycle::apply`]; stores persist its result
//! with a compare-and-set on the previous [`SealedState`].

use crate::error::{CapsuleError, Result};
use crate::state::{Capsule, SealedState, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Accepted format for open dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Seal state together with the open date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Lifecycle {
    /// Initial state; content is editable.
    #[default]
    Preseal,

    /// Frozen until `date_to_open`.
    Sealed {
        /// Earliest moment the owner may open the capsule.
        date_to_open: DateTime<Utc>,
    },

    /// Terminal state.
    Opened {
        /// Open date chosen when sealing.
        date_to_open: DateTime<Utc>,
    },
}

/// A requested lifecycle change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Freeze the capsule until `date_to_open`.
    Seal {
        /// Requested open date.
        date_to_open: DateTime<Utc>,
    },

    /// Reveal the capsule.
    Open,
}

impl Lifecycle {
    /// Coarse persisted state.
    #[must_use]
    pub const fn state(&self) -> SealedState {
        match self {
            Self::Preseal => SealedState::Preseal,
            Self::Sealed { .. } => SealedState::Sealed,
            Self::Opened { .. } => SealedState::Opened,
        }
    }

    /// Open date, if sealed or opened.
    #[must_use]
    pub const fn date_to_open(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Preseal => None,
            Self::Sealed { date_to_open } | Self::Opened { date_to_open } => Some(*date_to_open),
        }
    }

    /// Rebuild from the persisted `(state, date_to_open)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`CapsuleError::StoreError`] if the pair violates the
    /// "date iff sealed or opened" invariant.
    pub fn from_parts(state: SealedState, date_to_open: Option<DateTime<Utc>>) -> Result<Self> {
        match (state, date_to_open) {
            (SealedState::Preseal, None) => Ok(Self::Preseal),
            (SealedState::Sealed, Some(date_to_open)) => Ok(Self::Sealed { date_to_open }),
            (SealedState::Opened, Some(date_to_open)) => Ok(Self::Opened { date_to_open }),
            (state, date) => Err(CapsuleError::StoreError(format!(
                "Inconsistent lifecycle: state={} date_to_open={date:?}",
                state.as_str()
            ))),
        }
    }

    /// Compute the state reached by applying `event` at `now`.
    ///
    /// # Errors
    ///
    /// - [`CapsuleError::AlreadySealed`]: sealing anything but a preseal capsule
    /// - [`CapsuleError::NotSealed`]: opening anything but a sealed capsule
    /// - [`CapsuleError::TooEarly`]: opening before the open date
    pub fn apply(self, event: LifecycleEvent, now: DateTime<Utc>) -> Result<Self> {
        match (self, event) {
            (Self::Preseal, LifecycleEvent::Seal { date_to_open }) => {
                Ok(Self::Sealed { date_to_open })
            }
            (Self::Sealed { .. } | Self::Opened { .. }, LifecycleEvent::Seal { .. }) => {
                Err(CapsuleError::AlreadySealed)
            }
            (Self::Sealed { date_to_open }, LifecycleEvent::Open) => {
                if now < date_to_open {
                    return Err(CapsuleError::TooEarly { date_to_open });
                }
                Ok(Self::Opened { date_to_open })
            }
            (Self::Preseal | Self::Opened { .. }, LifecycleEvent::Open) => {
                Err(CapsuleError::NotSealed)
            }
        }
    }
}

/// Parse a `YYYY-MM-DD` open date as midnight UTC.
///
/// # Errors
///
/// Returns [`CapsuleError::InvalidDate`] if `input` is not a calendar date.
///
/// # Examples
///
/// ```
/// use time_capsule::lifecycle::parse_open_date;
///
/// assert!(parse_open_date("2030-02-28").is_ok());
/// assert!(parse_open_date("2030-02-30").is_err());
/// assert!(parse_open_date("next year").is_err());
/// ```
pub fn parse_open_date(input: &str) -> Result<DateTime<Utc>> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| CapsuleError::InvalidDate(input.to_string()))
}

/// How a read treats frozen capsules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// For flows that go on to mutate content; refuses sealed and opened capsules.
    Safe,

    /// For ownership and status checks; any state.
    Unsafe,
}

/// Check that `caller` may read `capsule` in `mode`.
///
/// # Errors
///
/// - [`CapsuleError::Forbidden`]: caller is neither owner nor member
/// - [`CapsuleError::AlreadySealed`]: safe read of a sealed or opened capsule
pub fn authorize_read(capsule: &Capsule, caller: UserId, mode: ReadMode) -> Result<()> {
    if !capsule.is_participant(caller) {
        return Err(CapsuleError::Forbidden);
    }
    if mode == ReadMode::Safe && capsule.state() != SealedState::Preseal {
        return Err(CapsuleError::AlreadySealed);
    }
    Ok(())
}

/// Check that `caller` owns `capsule`.
///
/// # Errors
///
/// Returns [`CapsuleError::NotOwner`] otherwise.
pub fn require_owner(capsule: &Capsule, caller: UserId) -> Result<()> {
    if capsule.is_owner(caller) {
        Ok(())
    } else {
        Err(CapsuleError::NotOwner)
    }
}
