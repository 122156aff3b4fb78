//! Blob cleanup after a capsule is deleted.
//!
//! Relational deletion happens in one store transaction and hands back the
//! blob object names its content rows referenced. [`purge_blobs`] then
//! deletes those objects one by one. A failed object is reported, never
//! retried here, and never causes the rows to come back.

use crate::providers::BlobStore;

/// Result of deleting a capsule's blobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// Every object was deleted.
    Complete {
        /// Deleted object names.
        deleted: Vec<String>,
    },

    /// Some objects could not be deleted and are now orphaned.
    PartialFailure {
        /// Deleted object names.
        deleted: Vec<String>,
        /// Names whose delete failed, with the store's message.
        failed: Vec<(String, String)>,
    },
}

impl DeletionOutcome {
    /// Whether every object was deleted.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// Names that were deleted.
    #[must_use]
    pub fn deleted(&self) -> &[String] {
        match self {
            Self::Complete { deleted } | Self::PartialFailure { deleted, .. } => deleted,
        }
    }

    /// Names left behind in the blob store.
    #[must_use]
    pub fn orphaned(&self) -> Vec<&str> {
        match self {
            Self::Complete { .. } => Vec::new(),
            Self::PartialFailure { failed, .. } => failed.iter().map(|(name, _)| name.as_str()).collect(),
        }
    }
}

/// Delete every object in `object_names`, attempting all of them.
pub async fn purge_blobs<B: BlobStore>(blobs: &B, object_names: Vec<String>) -> DeletionOutcome {
    let mut deleted = Vec::with_capacity(object_names.len());
    let mut failed = Vec::new();

    for name in object_names {
        match blobs.delete_object(&name).await {
            Ok(()) => deleted.push(name),
            Err(e) => {
                tracing::warn!(object_name = %name, error = %e, "Failed to delete blob; object orphaned");
                failed.push((name, e.to_string()));
            }
        }
    }

    if failed.is_empty() {
        DeletionOutcome::Complete { deleted }
    } else {
        DeletionOutcome::PartialFailure { deleted, failed }
    }
}
