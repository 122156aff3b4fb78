//! Capsule join codes.
//!
//! Codes are drawn from the 62-character alphanumeric alphabet. Drawing is
//! pure; uniqueness is checked by [`crate::service::CapsuleService`] against
//! the repository, with a bounded number of attempts.

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Source of candidate join codes.
///
/// Injected so tests can script collisions.
pub trait CodeGenerator: Send + Sync {
    /// Draw a code of `length` characters from `[a-zA-Z0-9]`.
    fn generate(&self, length: usize) -> String;
}

/// Production generator backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self, length: usize) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }
}

/// Whether `code` could have been produced by a [`CodeGenerator`] of `length`.
///
/// # Examples
///
/// ```
/// use time_capsule::code::is_valid_code;
///
/// assert!(is_valid_code("aB3dE5gH9k", 10));
/// assert!(!is_valid_code("aB3dE5gH9", 10));
/// assert!(!is_valid_code("aB3dE5gH9-", 10));
/// ```
#[must_use]
pub fn is_valid_code(code: &str, length: usize) -> bool {
    code.len() == length && code.bytes().all(|b| b.is_ascii_alphanumeric())
}
