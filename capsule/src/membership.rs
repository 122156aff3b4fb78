//! Member slot assignment.
//!
//! Membership is a relation of `(capsule, user, slot)` rows bounded by a
//! configured slot count. [`assign_slot`] is the single decision point; each
//! repository calls it inside its own atomic section (a row lock in
//! Postgres, a mutex in memory) so concurrent joins cannot both take the
//! last slot.

use crate::error::{CapsuleError, Result};
use crate::state::{Member, UserId};

/// Pick the slot `user` gets when joining.
///
/// Slots are scanned in order `1..=max_slots` and the first free one wins, so
/// replaying the same joins against the same starting state always yields
/// the same assignment.
///
/// # Errors
///
/// - [`CapsuleError::AlreadyMember`]: `user` is the owner or already a member
/// - [`CapsuleError::CapsuleFull`]: no free slot
///
/// # Examples
///
/// ```
/// use time_capsule::membership::assign_slot;
/// use time_capsule::UserId;
///
/// assert_eq!(assign_slot(UserId(1), &[], UserId(2), 5), Ok(1));
/// ```
pub fn assign_slot(owner: UserId, members: &[Member], user: UserId, max_slots: u8) -> Result<u8> {
    if owner == user || members.iter().any(|member| member.user_id == user) {
        return Err(CapsuleError::AlreadyMember);
    }

    (1..=max_slots)
        .find(|slot| members.iter().all(|member| member.slot != *slot))
        .ok_or(CapsuleError::CapsuleFull)
}
