//! In-memory capsule repository.

use crate::content::{ContentItem, ContentKind};
use crate::error::{CapsuleError, Result};
use crate::lifecycle::Lifecycle;
use crate::membership::assign_slot;
use crate::providers::CapsuleRepository;
use crate::state::{
    Capsule, CapsuleId, Member, NewCapsule, ReminderTarget, SealedState, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    capsules: BTreeMap<CapsuleId, Capsule>,
    content: Vec<ContentItem>,
    emails: HashMap<UserId, String>,
    occupied_codes: HashSet<String>,
    raced_codes: HashSet<String>,
    next_id: i64,
    unavailable: bool,
}

impl Inner {
    fn capsule_by_code(&mut self, code: &str) -> Option<&mut Capsule> {
        self.capsules.values_mut().find(|capsule| capsule.code == code)
    }

    fn is_due(capsule: &Capsule, now: DateTime<Utc>) -> bool {
        matches!(capsule.lifecycle, Lifecycle::Sealed { date_to_open } if date_to_open < now)
            && !capsule.reminder_email_sent
    }
}

/// In-memory capsule repository.
///
/// One mutex guards every table, so each call is atomic with respect to
/// every other call. Content rows and user emails are seeded by tests since
/// their writers live outside this crate.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCapsuleRepository {
    inner: Arc<Mutex<Inner>>,
}

fn lock(inner: &Mutex<Inner>) -> Result<MutexGuard<'_, Inner>> {
    let guard = inner
        .lock()
        .map_err(|_| CapsuleError::StoreError("Mutex lock failed".to_string()))?;
    if guard.unavailable {
        return Err(CapsuleError::StoreError("Store unavailable".to_string()));
    }
    Ok(guard)
}

fn lock_admin(inner: &Mutex<Inner>) -> Result<MutexGuard<'_, Inner>> {
    inner
        .lock()
        .map_err(|_| CapsuleError::StoreError("Mutex lock failed".to_string()))
}

impl InMemoryCapsuleRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user's email, as the account service would.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn register_user(&self, user_id: UserId, email: &str) -> Result<()> {
        lock_admin(&self.inner)?.emails.insert(user_id, email.to_string());
        Ok(())
    }

    /// Insert a content row, as a content service would.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn add_content(&self, item: ContentItem) -> Result<()> {
        lock_admin(&self.inner)?.content.push(item);
        Ok(())
    }

    /// Number of content rows of `kind` in `capsule_id`.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn content_count(&self, capsule_id: CapsuleId, kind: ContentKind) -> Result<usize> {
        Ok(lock_admin(&self.inner)?
            .content
            .iter()
            .filter(|item| item.capsule_id == capsule_id && item.kind == kind)
            .count())
    }

    /// Number of capsules stored.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn capsule_count(&self) -> Result<usize> {
        Ok(lock_admin(&self.inner)?.capsules.len())
    }

    /// Mark `code` as used by a capsule outside this store's view.
    ///
    /// `code_exists` reports it and `insert_capsule` rejects it.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn occupy_code(&self, code: &str) -> Result<()> {
        lock_admin(&self.inner)?.occupied_codes.insert(code.to_string());
        Ok(())
    }

    /// Simulate a concurrent creator taking `code` between check and insert.
    ///
    /// `code_exists` still reports it free but `insert_capsule` rejects it.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn race_code(&self, code: &str) -> Result<()> {
        lock_admin(&self.inner)?.raced_codes.insert(code.to_string());
        Ok(())
    }

    /// Toggle failure of every repository call with `StoreError`.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn set_unavailable(&self, unavailable: bool) -> Result<()> {
        lock_admin(&self.inner)?.unavailable = unavailable;
        Ok(())
    }
}

impl CapsuleRepository for InMemoryCapsuleRepository {
    fn code_exists(&self, code: &str) -> impl Future<Output = Result<bool>> + Send {
        let inner = Arc::clone(&self.inner);
        let code = code.to_string();

        async move {
            let guard = lock(&inner)?;
            Ok(guard.occupied_codes.contains(&code)
                || guard.capsules.values().any(|capsule| capsule.code == code))
        }
    }

    fn insert_capsule(&self, capsule: NewCapsule) -> impl Future<Output = Result<CapsuleId>> + Send {
        let inner = Arc::clone(&self.inner);

        async move {
            let mut guard = lock(&inner)?;
            let taken = guard.occupied_codes.contains(&capsule.code)
                || guard.raced_codes.contains(&capsule.code)
                || guard.capsules.values().any(|c| c.code == capsule.code);
            if taken {
                return Err(CapsuleError::CodeTaken);
            }

            guard.next_id += 1;
            let id = CapsuleId(guard.next_id);
            guard.capsules.insert(
                id,
                Capsule {
                    id,
                    code: capsule.code,
                    owner_id: capsule.owner_id,
                    members: Vec::new(),
                    vessel: capsule.vessel,
                    name: capsule.name,
                    public: capsule.public,
                    lifecycle: Lifecycle::Preseal,
                    reminder_email_sent: false,
                    created_at: capsule.created_at,
                },
            );
            Ok(id)
        }
    }

    fn find_by_id(&self, id: CapsuleId) -> impl Future<Output = Result<Option<Capsule>>> + Send {
        let inner = Arc::clone(&self.inner);

        async move { Ok(lock(&inner)?.capsules.get(&id).cloned()) }
    }

    fn find_by_code(&self, code: &str) -> impl Future<Output = Result<Option<Capsule>>> + Send {
        let inner = Arc::clone(&self.inner);
        let code = code.to_string();

        async move {
            Ok(lock(&inner)?
                .capsules
                .values()
                .find(|capsule| capsule.code == code)
                .cloned())
        }
    }

    fn list_for_user(&self, user_id: UserId) -> impl Future<Output = Result<Vec<Capsule>>> + Send {
        let inner = Arc::clone(&self.inner);

        async move {
            Ok(lock(&inner)?
                .capsules
                .values()
                .filter(|capsule| capsule.is_participant(user_id))
                .cloned()
                .collect())
        }
    }

    fn add_member(
        &self,
        code: &str,
        user_id: UserId,
        max_slots: u8,
        joined_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<u8>> + Send {
        let inner = Arc::clone(&self.inner);
        let code = code.to_string();

        async move {
            let mut guard = lock(&inner)?;
            let capsule = guard.capsule_by_code(&code).ok_or(CapsuleError::NotFound)?;

            let slot = assign_slot(capsule.owner_id, &capsule.members, user_id, max_slots)?;
            capsule.members.push(Member {
                user_id,
                slot,
                sealed: false,
                joined_at,
            });
            capsule.members.sort_by_key(|member| member.slot);
            Ok(slot)
        }
    }

    fn set_member_sealed(
        &self,
        id: CapsuleId,
        user_id: UserId,
    ) -> impl Future<Output = Result<bool>> + Send {
        let inner = Arc::clone(&self.inner);

        async move {
            let mut guard = lock(&inner)?;
            let Some(capsule) = guard.capsules.get_mut(&id) else {
                return Ok(false);
            };
            if capsule.state() != SealedState::Preseal {
                return Ok(false);
            }
            match capsule.members.iter_mut().find(|m| m.user_id == user_id) {
                Some(member) => {
                    member.sealed = true;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    fn rename(
        &self,
        id: CapsuleId,
        owner_id: UserId,
        name: &str,
    ) -> impl Future<Output = Result<bool>> + Send {
        let inner = Arc::clone(&self.inner);
        let name = name.to_string();

        async move {
            let mut guard = lock(&inner)?;
            match guard.capsules.get_mut(&id) {
                Some(capsule) if capsule.owner_id == owner_id => {
                    capsule.name = name;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }

    fn update_lifecycle(
        &self,
        id: CapsuleId,
        owner_id: UserId,
        from: SealedState,
        to: Lifecycle,
    ) -> impl Future<Output = Result<bool>> + Send {
        let inner = Arc::clone(&self.inner);

        async move {
            let mut guard = lock(&inner)?;
            match guard.capsules.get_mut(&id) {
                Some(capsule) if capsule.owner_id == owner_id && capsule.state() == from => {
                    capsule.lifecycle = to;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }

    fn delete_capsule(
        &self,
        id: CapsuleId,
        owner_id: UserId,
    ) -> impl Future<Output = Result<Vec<String>>> + Send {
        let inner = Arc::clone(&self.inner);

        async move {
            let mut guard = lock(&inner)?;
            if !guard
                .capsules
                .get(&id)
                .is_some_and(|capsule| capsule.owner_id == owner_id)
            {
                return Ok(Vec::new());
            }

            // Same order as the relational store: blob tables in table order.
            let content = &guard.content;
            let object_names: Vec<String> = ContentKind::BLOB_BACKED
                .iter()
                .flat_map(|kind| {
                    content
                        .iter()
                        .filter(move |item| item.capsule_id == id && item.kind == *kind)
                        .filter_map(|item| item.object_name.clone())
                })
                .collect();

            guard.content.retain(|item| item.capsule_id != id);
            guard.capsules.remove(&id);
            Ok(object_names)
        }
    }

    fn due_reminders(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ReminderTarget>>> + Send {
        let inner = Arc::clone(&self.inner);

        async move {
            let guard = lock(&inner)?;
            let emails = &guard.emails;
            Ok(guard
                .capsules
                .values()
                .filter(|capsule| Inner::is_due(capsule, now))
                .filter_map(|capsule| {
                    emails.get(&capsule.owner_id).map(|email| ReminderTarget {
                        capsule_id: capsule.id,
                        email: email.clone(),
                    })
                })
                .take(limit)
                .collect())
        }
    }

    fn mark_reminders_sent(
        &self,
        now: DateTime<Utc>,
        ids: &[CapsuleId],
    ) -> impl Future<Output = Result<u64>> + Send {
        let inner = Arc::clone(&self.inner);
        let ids = ids.to_vec();

        async move {
            let mut guard = lock(&inner)?;
            let mut marked = 0;
            for id in ids {
                if let Some(capsule) = guard.capsules.get_mut(&id) {
                    if Inner::is_due(capsule, now) {
                        capsule.reminder_email_sent = true;
                        marked += 1;
                    }
                }
            }
            Ok(marked)
        }
    }
}
