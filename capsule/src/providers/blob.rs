//! Blob store trait and object naming.

use crate::code::{CodeGenerator, RandomCodeGenerator};
use crate::error::Result;
use crate::state::UserId;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Length of the random part of an object name.
pub const OBJECT_NAME_RANDOM_LEN: usize = 16;

/// Reference to an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Key inside the bucket; what content rows store and deletion hands back.
    pub object_name: String,

    /// Publicly reachable URL of the object.
    pub public_url: String,
}

/// Object storage holding photos, audio, doodles and misc files.
pub trait BlobStore: Send + Sync {
    /// Upload `bytes` on behalf of `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CapsuleError::BlobStoreError`] if the upload fails.
    fn upload_object(
        &self,
        owner: UserId,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<StoredObject>> + Send;

    /// Delete the object named `object_name`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CapsuleError::BlobStoreError`] if the delete fails.
    fn delete_object(&self, object_name: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Build a collision-resistant object name: `{owner}-{random}-{nanos}{.ext}`.
///
/// The extension is taken from `file_name`, if it has one.
///
/// # Examples
///
/// ```
/// use time_capsule::providers::blob::object_name;
/// use time_capsule::UserId;
///
/// let name = object_name(UserId(7), "beach.jpg", chrono::Utc::now());
/// assert!(name.starts_with("7-"));
/// assert!(name.ends_with(".jpg"));
/// ```
#[must_use]
pub fn object_name(owner: UserId, file_name: &str, now: DateTime<Utc>) -> String {
    let random = RandomCodeGenerator.generate(OBJECT_NAME_RANDOM_LEN);
    let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros());
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    format!("{owner}-{random}-{nanos}{extension}")
}

/// Public URL of `object_name` under `base_url`.
#[must_use]
pub fn public_url(base_url: &str, object_name: &str) -> String {
    format!("{}/{object_name}", base_url.trim_end_matches('/'))
}
