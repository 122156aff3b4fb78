//! Capsule service.
//!
//! Entry point for every capsule operation a request handler performs. The
//! caller resolves identity first and passes a [`UserId`]; the service does
//! authorization, validation and lifecycle checks, then delegates
//! persistence to a [`CapsuleRepository`].
//!
//! Validation and authorization failures never reach a write.

use crate::code::{CodeGenerator, is_valid_code};
use crate::config::CapsuleConfig;
use crate::constants::metadata::MAX_NAME_LEN;
use crate::deletion::{DeletionOutcome, purge_blobs};
use crate::environment::Clock;
use crate::error::{CapsuleError, Result};
use crate::lifecycle::{Lifecycle, LifecycleEvent, ReadMode, authorize_read, parse_open_date, require_owner};
use crate::providers::{BlobStore, CapsuleRepository};
use crate::state::{Capsule, CapsuleId, NewCapsule, SealedState, UserId, Vessel};

/// Identity of a freshly created capsule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCapsule {
    /// Store-assigned ID.
    pub id: CapsuleId,

    /// Join code to share with members.
    pub code: String,
}

/// Capsule lifecycle and membership operations.
#[derive(Debug, Clone)]
pub struct CapsuleService<R, G, C> {
    repository: R,
    codes: G,
    clock: C,
    config: CapsuleConfig,
}

impl<R, G, C> CapsuleService<R, G, C>
where
    R: CapsuleRepository,
    G: CodeGenerator,
    C: Clock,
{
    /// Create a service.
    #[must_use]
    pub const fn new(repository: R, codes: G, clock: C, config: CapsuleConfig) -> Self {
        Self {
            repository,
            codes,
            clock,
            config,
        }
    }

    /// Underlying repository.
    #[must_use]
    pub const fn repository(&self) -> &R {
        &self.repository
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &CapsuleConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════════════
    // Creation & membership
    // ═══════════════════════════════════════════════════════════════════

    /// Create a capsule owned by `owner_id` under a fresh join code.
    ///
    /// Draws up to `max_code_attempts` codes. A code counts as a collision
    /// if the repository already knows it, or if the insert loses to a
    /// concurrent creator.
    ///
    /// # Errors
    ///
    /// - [`CapsuleError::InvalidUserId`]: `owner_id` is not a real user
    /// - [`CapsuleError::InvalidVessel`]: unknown vessel, nothing is drawn
    /// - [`CapsuleError::CodeGenerationExhausted`]: every drawn code collided
    /// - [`CapsuleError::StoreError`]: the store is unavailable
    pub async fn create_capsule(
        &self,
        owner_id: UserId,
        vessel: &str,
        public: bool,
    ) -> Result<CreatedCapsule> {
        let owner_id = UserId::new(owner_id.0)?;
        let vessel = Vessel::parse(vessel)?;
        let attempts = self.config.max_code_attempts;

        for attempt in 1..=attempts {
            let code = self.codes.generate(self.config.code_length);

            if self.repository.code_exists(&code).await? {
                tracing::debug!(attempt, "Capsule code collision");
                continue;
            }

            let new_capsule = NewCapsule {
                code: code.clone(),
                owner_id,
                vessel,
                name: self.config.default_name.clone(),
                public,
                created_at: self.clock.now(),
            };

            match self.repository.insert_capsule(new_capsule).await {
                Ok(id) => {
                    tracing::info!(capsule_id = %id, owner_id = %owner_id, vessel = vessel.as_str(), "Capsule created");
                    return Ok(CreatedCapsule { id, code });
                }
                Err(CapsuleError::CodeTaken) => {
                    tracing::debug!(attempt, "Capsule code taken concurrently");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::warn!(owner_id = %owner_id, attempts, "Capsule code generation exhausted");
        Err(CapsuleError::CodeGenerationExhausted { attempts })
    }

    /// Join the capsule identified by `code`. Returns the assigned slot.
    ///
    /// # Errors
    ///
    /// - [`CapsuleError::InvalidUserId`]: `user_id` is not a real user
    /// - [`CapsuleError::NotFound`]: malformed or unknown code
    /// - [`CapsuleError::AlreadyMember`]: caller is the owner or already a member
    /// - [`CapsuleError::CapsuleFull`]: every member slot is taken
    pub async fn join_capsule(&self, user_id: UserId, code: &str) -> Result<u8> {
        let user_id = UserId::new(user_id.0)?;
        if !is_valid_code(code, self.config.code_length) {
            return Err(CapsuleError::NotFound);
        }

        let slot = self
            .repository
            .add_member(code, user_id, self.config.member_slots, self.clock.now())
            .await?;

        tracing::info!(user_id = %user_id, slot, "Member joined capsule");
        Ok(slot)
    }

    /// Flag the caller's own membership as sealed.
    ///
    /// Idempotent. The owner is not a member and cannot confirm.
    ///
    /// # Errors
    ///
    /// - [`CapsuleError::NotFound`] / [`CapsuleError::Forbidden`]
    /// - [`CapsuleError::AlreadySealed`]: the capsule has left `Preseal`
    pub async fn confirm_member_seal(&self, user_id: UserId, capsule_id: CapsuleId) -> Result<()> {
        let capsule = self.read(user_id, capsule_id, ReadMode::Unsafe).await?;
        let member = capsule.member(user_id).ok_or(CapsuleError::Forbidden)?;

        if capsule.state() != SealedState::Preseal {
            return Err(CapsuleError::AlreadySealed);
        }
        if member.sealed {
            return Ok(());
        }

        if !self.repository.set_member_sealed(capsule_id, user_id).await? {
            return Err(CapsuleError::AlreadySealed);
        }

        tracing::info!(capsule_id = %capsule_id, user_id = %user_id, "Member confirmed seal");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Reads
    // ═══════════════════════════════════════════════════════════════════

    /// Every capsule the caller owns or is a member of, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    pub async fn get_capsules(&self, user_id: UserId) -> Result<Vec<Capsule>> {
        self.repository.list_for_user(user_id).await
    }

    /// Read a capsule about to be edited.
    ///
    /// # Errors
    ///
    /// - [`CapsuleError::NotFound`] / [`CapsuleError::Forbidden`]
    /// - [`CapsuleError::AlreadySealed`]: the capsule is sealed or opened
    pub async fn get_capsule(&self, user_id: UserId, capsule_id: CapsuleId) -> Result<Capsule> {
        self.read(user_id, capsule_id, ReadMode::Safe).await
    }

    /// Read a capsule in any state, for ownership and status checks.
    ///
    /// # Errors
    ///
    /// - [`CapsuleError::NotFound`] / [`CapsuleError::Forbidden`]
    pub async fn get_capsule_unsafe(&self, user_id: UserId, capsule_id: CapsuleId) -> Result<Capsule> {
        self.read(user_id, capsule_id, ReadMode::Unsafe).await
    }

    /// Read a capsule for display. Content stays hidden while sealed.
    ///
    /// # Errors
    ///
    /// - [`CapsuleError::NotFound`] / [`CapsuleError::Forbidden`]
    /// - [`CapsuleError::CapsuleSealed`]: the capsule is sealed
    pub async fn view_capsule(&self, user_id: UserId, capsule_id: CapsuleId) -> Result<Capsule> {
        let capsule = self.read(user_id, capsule_id, ReadMode::Unsafe).await?;
        if capsule.state() == SealedState::Sealed {
            return Err(CapsuleError::CapsuleSealed);
        }
        Ok(capsule)
    }

    async fn read(&self, user_id: UserId, capsule_id: CapsuleId, mode: ReadMode) -> Result<Capsule> {
        let capsule = self
            .repository
            .find_by_id(capsule_id)
            .await?
            .ok_or(CapsuleError::NotFound)?;
        authorize_read(&capsule, user_id, mode)?;
        Ok(capsule)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Owner operations
    // ═══════════════════════════════════════════════════════════════════

    /// Rename a capsule. Allowed in every state.
    ///
    /// # Errors
    ///
    /// - [`CapsuleError::InvalidName`]: blank after trimming, or too long
    /// - [`CapsuleError::NotFound`] / [`CapsuleError::Forbidden`] / [`CapsuleError::NotOwner`]
    pub async fn rename_capsule(&self, user_id: UserId, capsule_id: CapsuleId, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(CapsuleError::InvalidName);
        }

        let capsule = self.read(user_id, capsule_id, ReadMode::Unsafe).await?;
        require_owner(&capsule, user_id)?;

        if !self.repository.rename(capsule_id, user_id, name).await? {
            return Err(CapsuleError::NotFound);
        }
        tracing::info!(capsule_id = %capsule_id, "Capsule renamed");
        Ok(())
    }

    /// Seal a capsule until `date_to_open` (`YYYY-MM-DD`, midnight UTC).
    ///
    /// # Errors
    ///
    /// - [`CapsuleError::InvalidDate`]: checked before the store is touched
    /// - [`CapsuleError::NotFound`] / [`CapsuleError::Forbidden`] / [`CapsuleError::NotOwner`]
    /// - [`CapsuleError::AlreadySealed`]: not in `Preseal`, including a lost race
    pub async fn seal_capsule(
        &self,
        user_id: UserId,
        capsule_id: CapsuleId,
        date_to_open: &str,
    ) -> Result<Lifecycle> {
        let date_to_open = parse_open_date(date_to_open)?;
        self.transition(user_id, capsule_id, LifecycleEvent::Seal { date_to_open }, CapsuleError::AlreadySealed)
            .await
    }

    /// Open a sealed capsule whose open date has passed.
    ///
    /// # Errors
    ///
    /// - [`CapsuleError::NotFound`] / [`CapsuleError::Forbidden`] / [`CapsuleError::NotOwner`]
    /// - [`CapsuleError::NotSealed`]: not in `Sealed`, including a lost race
    /// - [`CapsuleError::TooEarly`]: the open date is still in the future
    pub async fn open_capsule(&self, user_id: UserId, capsule_id: CapsuleId) -> Result<Lifecycle> {
        self.transition(user_id, capsule_id, LifecycleEvent::Open, CapsuleError::NotSealed)
            .await
    }

    async fn transition(
        &self,
        user_id: UserId,
        capsule_id: CapsuleId,
        event: LifecycleEvent,
        lost_race: CapsuleError,
    ) -> Result<Lifecycle> {
        let capsule = self.read(user_id, capsule_id, ReadMode::Unsafe).await?;
        require_owner(&capsule, user_id)?;

        let next = capsule
            .lifecycle
            .apply(event, self.clock.now())
            .inspect_err(|e| {
                tracing::warn!(capsule_id = %capsule_id, state = capsule.state().as_str(), error = %e, "Lifecycle transition rejected");
            })?;

        let applied = self
            .repository
            .update_lifecycle(capsule_id, user_id, capsule.state(), next)
            .await?;
        if !applied {
            tracing::warn!(capsule_id = %capsule_id, "Lifecycle transition lost a concurrent update");
            return Err(lost_race);
        }

        tracing::info!(
            capsule_id = %capsule_id,
            from = capsule.state().as_str(),
            to = next.state().as_str(),
            "Capsule lifecycle changed"
        );
        Ok(next)
    }

    /// Delete a capsule with its members and content, in any state.
    ///
    /// Returns the blob object names the content referenced; the caller is
    /// responsible for removing them, or can use
    /// [`CapsuleService::delete_capsule_and_blobs`].
    ///
    /// # Errors
    ///
    /// - [`CapsuleError::NotFound`] / [`CapsuleError::Forbidden`] / [`CapsuleError::NotOwner`]
    /// - [`CapsuleError::StoreError`]: nothing was deleted
    pub async fn delete_capsule(&self, user_id: UserId, capsule_id: CapsuleId) -> Result<Vec<String>> {
        let capsule = self.read(user_id, capsule_id, ReadMode::Unsafe).await?;
        require_owner(&capsule, user_id)?;

        let object_names = self.repository.delete_capsule(capsule_id, user_id).await?;
        tracing::info!(
            capsule_id = %capsule_id,
            state = capsule.state().as_str(),
            blobs = object_names.len(),
            "Capsule deleted"
        );
        Ok(object_names)
    }

    /// Delete a capsule, then every blob its content referenced.
    ///
    /// Blob failures do not undo the relational delete; they are reported
    /// in [`DeletionOutcome::PartialFailure`].
    ///
    /// # Errors
    ///
    /// Same as [`CapsuleService::delete_capsule`].
    pub async fn delete_capsule_and_blobs<B: BlobStore>(
        &self,
        user_id: UserId,
        capsule_id: CapsuleId,
        blobs: &B,
    ) -> Result<DeletionOutcome> {
        let object_names = self.delete_capsule(user_id, capsule_id).await?;
        Ok(purge_blobs(blobs, object_names).await)
    }
}
