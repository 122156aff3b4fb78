//! Mock blob store for testing.

use crate::error::{CapsuleError, Result};
use crate::providers::blob::{object_name, public_url};
use crate::providers::{BlobStore, StoredObject};
use crate::state::UserId;
use chrono::Utc;
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

const BASE_URL: &str = "memory://capsule-bucket";

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeSet<String>,
    deleted: Vec<String>,
    failing: HashSet<String>,
}

/// In-memory blob store.
///
/// Deleting a name that was never uploaded succeeds, like a bucket with
/// idempotent deletes. Names registered with [`MockBlobStore::fail_on`]
/// always fail.
#[derive(Debug, Clone, Default)]
pub struct MockBlobStore {
    inner: Arc<Mutex<Inner>>,
}

fn lock(inner: &Mutex<Inner>) -> Result<std::sync::MutexGuard<'_, Inner>> {
    inner
        .lock()
        .map_err(|_| CapsuleError::BlobStoreError("Mutex lock failed".to_string()))
}

impl MockBlobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delete of `object_name` fail.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn fail_on(&self, object_name: &str) -> Result<()> {
        lock(&self.inner)?.failing.insert(object_name.to_string());
        Ok(())
    }

    /// Names successfully deleted, in call order.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn deleted(&self) -> Result<Vec<String>> {
        Ok(lock(&self.inner)?.deleted.clone())
    }

    /// Whether `object_name` is currently stored.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn contains(&self, object_name: &str) -> Result<bool> {
        Ok(lock(&self.inner)?.objects.contains(object_name))
    }
}

impl BlobStore for MockBlobStore {
    fn upload_object(
        &self,
        owner: UserId,
        file_name: &str,
        _bytes: Vec<u8>,
    ) -> impl Future<Output = Result<StoredObject>> + Send {
        let inner = Arc::clone(&self.inner);
        let name = object_name(owner, file_name, Utc::now());

        async move {
            lock(&inner)?.objects.insert(name.clone());
            Ok(StoredObject {
                public_url: public_url(BASE_URL, &name),
                object_name: name,
            })
        }
    }

    fn delete_object(&self, object_name: &str) -> impl Future<Output = Result<()>> + Send {
        let inner = Arc::clone(&self.inner);
        let name = object_name.to_string();

        async move {
            let mut guard = lock(&inner)?;
            if guard.failing.contains(&name) {
                return Err(CapsuleError::BlobStoreError(format!("Failed to delete {name}")));
            }
            guard.objects.remove(&name);
            guard.deleted.push(name);
            Ok(())
        }
    }
}
