//! `PostgreSQL` capsule repository.
//!
//! Schema lives in `capsule/migrations`. Multi-statement operations run in
//! one transaction; joins and deletes lock the capsule row first.
//!
//! # Example
//!
//! ```no_run
//! use time_capsule::stores::PostgresCapsuleRepository;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = PostgresCapsuleRepository::connect("postgresql://localhost/time_capsule", 5).await?;
//! repo.migrate().await?;
//! # Ok(())
//! # }
//! ```

use crate::content::ContentKind;
use crate::error::{CapsuleError, Result};
use crate::lifecycle::Lifecycle;
use crate::membership::assign_slot;
use crate::providers::CapsuleRepository;
use crate::state::{
    Capsule, CapsuleId, Member, NewCapsule, ReminderTarget, SealedState, UserId, Vessel,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{PgConnection, Row};
use std::collections::HashMap;

const CAPSULE_COLUMNS: &str =
    "id, code, owner_id, vessel, name, public, state, date_to_open, reminder_email_sent, created_at";

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> CapsuleError {
    move |e| CapsuleError::StoreError(format!("{context}: {e}"))
}

/// `PostgreSQL` capsule repository.
#[derive(Clone)]
pub struct PostgresCapsuleRepository {
    /// `PostgreSQL` connection pool.
    pool: PgPool,
}

impl PostgresCapsuleRepository {
    /// Create a repository over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(db_error("Failed to connect"))?;

        Ok(Self::new(pool))
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns error if migrations fail.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CapsuleError::StoreError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_member(row: &PgRow) -> Result<Member> {
        let slot: i16 = row.try_get("slot").map_err(db_error("Failed to read slot"))?;
        Ok(Member {
            user_id: UserId(row.try_get("user_id").map_err(db_error("Failed to read user_id"))?),
            slot: u8::try_from(slot)
                .map_err(|_| CapsuleError::StoreError(format!("Invalid member slot: {slot}")))?,
            sealed: row.try_get("sealed").map_err(db_error("Failed to read sealed"))?,
            joined_at: row.try_get("joined_at").map_err(db_error("Failed to read joined_at"))?,
        })
    }

    fn row_to_capsule(row: &PgRow, members: Vec<Member>) -> Result<Capsule> {
        let state: String = row.try_get("state").map_err(db_error("Failed to read state"))?;
        let vessel: String = row.try_get("vessel").map_err(db_error("Failed to read vessel"))?;
        let date_to_open: Option<DateTime<Utc>> =
            row.try_get("date_to_open").map_err(db_error("Failed to read date_to_open"))?;

        Ok(Capsule {
            id: CapsuleId(row.try_get("id").map_err(db_error("Failed to read id"))?),
            code: row.try_get("code").map_err(db_error("Failed to read code"))?,
            owner_id: UserId(row.try_get("owner_id").map_err(db_error("Failed to read owner_id"))?),
            members,
            vessel: Vessel::parse(&vessel)
                .map_err(|_| CapsuleError::StoreError(format!("Invalid vessel in store: {vessel}")))?,
            name: row.try_get("name").map_err(db_error("Failed to read name"))?,
            public: row.try_get("public").map_err(db_error("Failed to read public"))?,
            lifecycle: Lifecycle::from_parts(SealedState::parse(&state)?, date_to_open)?,
            reminder_email_sent: row
                .try_get("reminder_email_sent")
                .map_err(db_error("Failed to read reminder_email_sent"))?,
            created_at: row.try_get("created_at").map_err(db_error("Failed to read created_at"))?,
        })
    }

    async fn members_of(conn: &mut PgConnection, capsule_id: CapsuleId) -> Result<Vec<Member>> {
        let rows = sqlx::query(
            r"
            SELECT user_id, slot, sealed, joined_at
            FROM capsule_members
            WHERE capsule_id = $1
            ORDER BY slot
            ",
        )
        .bind(capsule_id.0)
        .fetch_all(conn)
        .await
        .map_err(db_error("Failed to load members"))?;

        rows.iter().map(Self::row_to_member).collect()
    }

    /// Attach members to capsule rows with one query.
    async fn with_members(&self, rows: Vec<PgRow>) -> Result<Vec<Capsule>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            ids.push(row.try_get::<i64, _>("id").map_err(db_error("Failed to read id"))?);
        }

        let member_rows = sqlx::query(
            r"
            SELECT capsule_id, user_id, slot, sealed, joined_at
            FROM capsule_members
            WHERE capsule_id = ANY($1)
            ORDER BY capsule_id, slot
            ",
        )
        .bind(ids.as_slice())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load members"))?;

        let mut members: HashMap<i64, Vec<Member>> = HashMap::new();
        for row in &member_rows {
            let capsule_id: i64 = row.try_get("capsule_id").map_err(db_error("Failed to read capsule_id"))?;
            members.entry(capsule_id).or_default().push(Self::row_to_member(row)?);
        }

        rows.iter()
            .zip(ids)
            .map(|(row, id)| Self::row_to_capsule(row, members.remove(&id).unwrap_or_default()))
            .collect()
    }

    async fn find_one(&self, sql: &str, key: Key<'_>) -> Result<Option<Capsule>> {
        let query = sqlx::query(sql);
        let query = match key {
            Key::Id(id) => query.bind(id.0),
            Key::Code(code) => query.bind(code),
        };
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to get capsule"))?;

        Ok(self.with_members(row.into_iter().collect()).await?.pop())
    }
}

enum Key<'a> {
    Id(CapsuleId),
    Code(&'a str),
}

impl CapsuleRepository for PostgresCapsuleRepository {
    async fn code_exists(&self, code: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM capsules WHERE code = $1)")
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to check code"))
    }

    async fn insert_capsule(&self, capsule: NewCapsule) -> Result<CapsuleId> {
        let id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO capsules (code, owner_id, vessel, name, public, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(&capsule.code)
        .bind(capsule.owner_id.0)
        .bind(capsule.vessel.as_str())
        .bind(&capsule.name)
        .bind(capsule.public)
        .bind(capsule.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return CapsuleError::CodeTaken;
                }
            }
            CapsuleError::StoreError(format!("Failed to insert capsule: {e}"))
        })?;

        Ok(CapsuleId(id))
    }

    async fn find_by_id(&self, id: CapsuleId) -> Result<Option<Capsule>> {
        let sql = format!("SELECT {CAPSULE_COLUMNS} FROM capsules WHERE id = $1");
        self.find_one(&sql, Key::Id(id)).await
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Capsule>> {
        let sql = format!("SELECT {CAPSULE_COLUMNS} FROM capsules WHERE code = $1");
        self.find_one(&sql, Key::Code(code)).await
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Capsule>> {
        let sql = format!(
            r"
            SELECT {CAPSULE_COLUMNS}
            FROM capsules
            WHERE owner_id = $1
               OR id IN (SELECT capsule_id FROM capsule_members WHERE user_id = $1)
            ORDER BY id
            "
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list capsules"))?;

        self.with_members(rows).await
    }

    async fn add_member(
        &self,
        code: &str,
        user_id: UserId,
        max_slots: u8,
        joined_at: DateTime<Utc>,
    ) -> Result<u8> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to start transaction"))?;

        // Serializes concurrent joins on the same capsule.
        let row = sqlx::query("SELECT id, owner_id FROM capsules WHERE code = $1 FOR UPDATE")
            .bind(code)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("Failed to lock capsule"))?
            .ok_or(CapsuleError::NotFound)?;

        let capsule_id = CapsuleId(row.try_get("id").map_err(db_error("Failed to read id"))?);
        let owner_id = UserId(row.try_get("owner_id").map_err(db_error("Failed to read owner_id"))?);

        let members = Self::members_of(&mut *tx, capsule_id).await?;
        let slot = assign_slot(owner_id, &members, user_id, max_slots)?;

        sqlx::query(
            r"
            INSERT INTO capsule_members (capsule_id, user_id, slot, sealed, joined_at)
            VALUES ($1, $2, $3, FALSE, $4)
            ",
        )
        .bind(capsule_id.0)
        .bind(user_id.0)
        .bind(i16::from(slot))
        .bind(joined_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to insert member"))?;

        tx.commit().await.map_err(db_error("Failed to commit transaction"))?;
        Ok(slot)
    }

    async fn set_member_sealed(&self, id: CapsuleId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE capsule_members AS m
            SET sealed = TRUE
            FROM capsules AS c
            WHERE m.capsule_id = c.id
              AND c.id = $1
              AND m.user_id = $2
              AND c.state = 'preseal'
            ",
        )
        .bind(id.0)
        .bind(user_id.0)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to confirm member seal"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn rename(&self, id: CapsuleId, owner_id: UserId, name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE capsules SET name = $3 WHERE id = $1 AND owner_id = $2")
            .bind(id.0)
            .bind(owner_id.0)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to rename capsule"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_lifecycle(
        &self,
        id: CapsuleId,
        owner_id: UserId,
        from: SealedState,
        to: Lifecycle,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE capsules
            SET state = $4, date_to_open = $5
            WHERE id = $1 AND owner_id = $2 AND state = $3
            ",
        )
        .bind(id.0)
        .bind(owner_id.0)
        .bind(from.as_str())
        .bind(to.state().as_str())
        .bind(to.date_to_open())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update lifecycle"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_capsule(&self, id: CapsuleId, owner_id: UserId) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to start transaction"))?;

        let owned = sqlx::query("SELECT id FROM capsules WHERE id = $1 AND owner_id = $2 FOR UPDATE")
            .bind(id.0)
            .bind(owner_id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("Failed to lock capsule"))?;
        if owned.is_none() {
            tx.rollback().await.map_err(db_error("Failed to roll back"))?;
            return Ok(Vec::new());
        }

        for kind in ContentKind::ROW_ONLY {
            let sql = format!("DELETE FROM {} WHERE capsule_id = $1", kind.table());
            sqlx::query(&sql)
                .bind(id.0)
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to delete content"))?;
        }

        let mut object_names = Vec::new();
        for kind in ContentKind::BLOB_BACKED {
            let sql = format!(
                "DELETE FROM {} WHERE capsule_id = $1 RETURNING object_name",
                kind.table()
            );
            let names: Vec<String> = sqlx::query_scalar(&sql)
                .bind(id.0)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_error("Failed to delete blob content"))?;
            object_names.extend(names);
        }

        sqlx::query("DELETE FROM capsule_members WHERE capsule_id = $1")
            .bind(id.0)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to delete members"))?;

        sqlx::query("DELETE FROM capsules WHERE id = $1 AND owner_id = $2")
            .bind(id.0)
            .bind(owner_id.0)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to delete capsule"))?;

        tx.commit().await.map_err(db_error("Failed to commit transaction"))?;
        Ok(object_names)
    }

    async fn due_reminders(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ReminderTarget>> {
        let limit = i64::try_from(limit)
            .map_err(|_| CapsuleError::StoreError(format!("Invalid batch size: {limit}")))?;
        let rows = sqlx::query(
            r"
            SELECT c.id, u.email
            FROM capsules AS c
            JOIN users AS u ON u.id = c.owner_id
            WHERE c.state = 'sealed'
              AND c.date_to_open < $1
              AND NOT c.reminder_email_sent
            ORDER BY c.id
            LIMIT $2
            ",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to select due reminders"))?;

        rows.iter()
            .map(|row| {
                Ok(ReminderTarget {
                    capsule_id: CapsuleId(row.try_get("id").map_err(db_error("Failed to read id"))?),
                    email: row.try_get("email").map_err(db_error("Failed to read email"))?,
                })
            })
            .collect()
    }

    async fn mark_reminders_sent(&self, now: DateTime<Utc>, ids: &[CapsuleId]) -> Result<u64> {
        let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();

        let result = sqlx::query(
            r"
            UPDATE capsules
            SET reminder_email_sent = TRUE
            WHERE id = ANY($2)
              AND state = 'sealed'
              AND date_to_open < $1
              AND NOT reminder_email_sent
            ",
        )
        .bind(now)
        .bind(ids.as_slice())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to mark reminders"))?;

        Ok(result.rows_affected())
    }
}
