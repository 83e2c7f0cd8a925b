use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rocket_db_pools::sqlx::{self, FromRow, PgPool};
use uuid::Uuid;

use crate::auth::{AuthError, AuthResult};

/// Server-side record binding an admin to the currently valid token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: Uuid,
    pub identity_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Row-atomic persistence for session records.
///
/// Every method is a single linearizable operation on one row (or one
/// identity's rows); callers never hold a lock across calls.
#[rocket::async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &Session) -> AuthResult<()>;

    async fn find(&self, session_id: Uuid) -> AuthResult<Option<Session>>;

    /// Returns `false` when the row no longer exists.
    async fn update_access_token(&self, session_id: Uuid, access_token: &str) -> AuthResult<bool>;

    /// Returns whether a row was removed; deleting an absent row is not an error.
    async fn delete(&self, session_id: Uuid) -> AuthResult<bool>;

    async fn delete_for_identity(&self, identity_id: &str) -> AuthResult<u64>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

#[derive(Debug, FromRow)]
struct SessionRow {
    session_id: Uuid,
    admin_id: String,
    access_token: String,
    refresh_token: String,
    refresh_expires_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            session_id: row.session_id,
            identity_id: row.admin_id,
            access_token: row.access_token,
            refresh_token: row.refresh_token,
            refresh_expires_at: row.refresh_expires_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: &Session) -> AuthResult<()> {
        sqlx::query(
            "INSERT INTO admin_sessions (session_id, admin_id, access_token, refresh_token, refresh_expires_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(session.session_id)
        .bind(&session.identity_id)
        .bind(&session.access_token)
        .bind(&session.refresh_token)
        .bind(session.refresh_expires_at)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            let duplicate = err
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation());
            if duplicate {
                AuthError::SessionConflict(session.session_id)
            } else {
                AuthError::from(err)
            }
        })?;

        Ok(())
    }

    async fn find(&self, session_id: Uuid) -> AuthResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT session_id, admin_id, access_token, refresh_token, refresh_expires_at FROM admin_sessions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Session::from))
    }

    async fn update_access_token(&self, session_id: Uuid, access_token: &str) -> AuthResult<bool> {
        let result = sqlx::query(
            "UPDATE admin_sessions SET access_token = $1, rotated_at = now() WHERE session_id = $2",
        )
        .bind(access_token)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, session_id: Uuid) -> AuthResult<bool> {
        let result = sqlx::query("DELETE FROM admin_sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_identity(&self, identity_id: &str) -> AuthResult<u64> {
        let result = sqlx::query("DELETE FROM admin_sessions WHERE admin_id = $1")
            .bind(identity_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let result = sqlx::query("DELETE FROM admin_sessions WHERE refresh_expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// In-process store for single-node deployments and tests.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<Uuid, Session>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[rocket::async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: &Session) -> AuthResult<()> {
        match self.sessions.entry(session.session_id) {
            Entry::Occupied(_) => Err(AuthError::SessionConflict(session.session_id)),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(())
            }
        }
    }

    async fn find(&self, session_id: Uuid) -> AuthResult<Option<Session>> {
        Ok(self.sessions.get(&session_id).map(|entry| entry.clone()))
    }

    async fn update_access_token(&self, session_id: Uuid, access_token: &str) -> AuthResult<bool> {
        match self.sessions.get_mut(&session_id) {
            Some(mut entry) => {
                entry.access_token = access_token.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, session_id: Uuid) -> AuthResult<bool> {
        Ok(self.sessions.remove(&session_id).is_some())
    }

    async fn delete_for_identity(&self, identity_id: &str) -> AuthResult<u64> {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.identity_id != identity_id);
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.refresh_expires_at > now);
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }
}
