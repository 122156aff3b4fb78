//! Capsule constants.
//!
//! Defaults used by [`crate::config`] and limits shared by every store.

/// Join code parameters.
pub mod codes {
    /// Length of a capsule join code.
    pub const CODE_LENGTH: usize = 10;

    /// Maximum number of codes drawn before creation gives up.
    pub const MAX_CODE_ATTEMPTS: u32 = 10;
}

/// Membership limits.
pub mod members {
    /// Number of member slots per capsule (the owner is not counted).
    pub const MEMBER_SLOTS: u8 = 5;
}

/// Capsule metadata defaults.
pub mod metadata {
    /// Name given to every new capsule.
    pub const DEFAULT_CAPSULE_NAME: &str = "My Time Capsule";

    /// Longest accepted capsule name, in characters.
    pub const MAX_NAME_LEN: usize = 64;
}

/// Reminder mail defaults.
pub mod reminders {
    /// Capsules handled per dispatch; stays under common per-call recipient limits.
    pub const BATCH_SIZE: usize = 490;

    /// Subject of the reminder mail.
    pub const SUBJECT: &str = "Your Time Capsule is Ready!";

    /// Body of the reminder mail.
    pub const BODY: &str =
        "Your time capsule is ready to be opened! Open our app to see what's inside!";
}
