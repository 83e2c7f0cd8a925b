use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rocket_db_pools::sqlx::{self, FromRow, PgPool};

use crate::auth::{AuthError, AuthResult};

/// Administrator account as seen by the authentication core.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Identity {
    pub id: String,
    #[sqlx(rename = "password_hash")]
    pub secret_hash: String,
    #[sqlx(rename = "name")]
    pub display_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Columns that must be unique across administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    Id,
    Email,
    Phone,
}

impl IdentityField {
    fn column(self) -> &'static str {
        match self {
            IdentityField::Id => "id",
            IdentityField::Email => "email",
            IdentityField::Phone => "phone",
        }
    }
}

#[rocket::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_identity(&self, id: &str) -> AuthResult<Option<Identity>>;

    async fn is_taken(&self, field: IdentityField, value: &str) -> AuthResult<bool>;

    async fn insert_identity(&self, identity: &Identity) -> AuthResult<()>;

    /// Replaces every stored field of an existing identity. Returns `false`
    /// when no identity has that id.
    async fn update_identity(&self, identity: &Identity) -> AuthResult<bool>;

    async fn delete_identity(&self, id: &str) -> AuthResult<bool>;

    async fn identity_exists(&self, id: &str) -> AuthResult<bool> {
        self.is_taken(IdentityField::Id, id).await
    }
}

#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_identity(&self, id: &str) -> AuthResult<Option<Identity>> {
        let identity = sqlx::query_as::<_, Identity>(
            "SELECT id, password_hash, name, email, phone FROM admins WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    async fn is_taken(&self, field: IdentityField, value: &str) -> AuthResult<bool> {
        // Column names come from a closed enum, never from input.
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM admins WHERE {} = $1)",
            field.column()
        );
        let exists: bool = sqlx::query_scalar(&sql)
            .bind(value)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn insert_identity(&self, identity: &Identity) -> AuthResult<()> {
        let result = sqlx::query(
            "INSERT INTO admins (id, password_hash, name, email, phone) VALUES ($1, $2, $3, $4, $5) ON CONFLICT (id) DO NOTHING",
        )
        .bind(&identity.id)
        .bind(&identity.secret_hash)
        .bind(&identity.display_name)
        .bind(&identity.email)
        .bind(&identity.phone)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::IdentityExists(identity.id.clone()));
        }
        Ok(())
    }

    async fn update_identity(&self, identity: &Identity) -> AuthResult<bool> {
        let result = sqlx::query(
            "UPDATE admins SET password_hash = $2, name = $3, email = $4, phone = $5 WHERE id = $1",
        )
        .bind(&identity.id)
        .bind(&identity.secret_hash)
        .bind(&identity.display_name)
        .bind(&identity.email)
        .bind(&identity.phone)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            let duplicate = err
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation());
            if duplicate {
                AuthError::IdentityExists(identity.id.clone())
            } else {
                AuthError::from(err)
            }
        })?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_identity(&self, id: &str) -> AuthResult<bool> {
        let result = sqlx::query("DELETE FROM admins WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    identities: DashMap<String, Identity>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_identity(&self, id: &str) -> AuthResult<Option<Identity>> {
        Ok(self.identities.get(id).map(|entry| entry.clone()))
    }

    async fn is_taken(&self, field: IdentityField, value: &str) -> AuthResult<bool> {
        let taken = match field {
            IdentityField::Id => self.identities.contains_key(value),
            IdentityField::Email => self
                .identities
                .iter()
                .any(|entry| entry.email.as_deref() == Some(value)),
            IdentityField::Phone => self
                .identities
                .iter()
                .any(|entry| entry.phone.as_deref() == Some(value)),
        };
        Ok(taken)
    }

    async fn insert_identity(&self, identity: &Identity) -> AuthResult<()> {
        match self.identities.entry(identity.id.clone()) {
            Entry::Occupied(_) => Err(AuthError::IdentityExists(identity.id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(identity.clone());
                Ok(())
            }
        }
    }

    async fn update_identity(&self, identity: &Identity) -> AuthResult<bool> {
        match self.identities.get_mut(&identity.id) {
            Some(mut entry) => {
                *entry = identity.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_identity(&self, id: &str) -> AuthResult<bool> {
        Ok(self.identities.remove(id).is_some())
    }
}
