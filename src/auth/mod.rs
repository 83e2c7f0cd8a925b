//! Authentication module: configuration, token codec, session storage,
//! Rocket request guards, and HTTP route handlers.

use std::sync::Arc;

use rocket_db_pools::sqlx::PgPool;

use crate::auth::credentials::Identity;

pub mod authenticator;
pub mod codec;
pub mod config;
pub mod credentials;
pub mod error;
pub mod guards;
pub mod header;
pub mod passwords;
pub mod responses;
pub mod routes;
pub mod session_store;

pub use authenticator::{IssuedSession, IssuedTokens, SessionAuthenticator};
pub use config::{AuthConfig, BootstrapAdmin};
pub use credentials::{CredentialStore, MemoryCredentialStore, PgCredentialStore};
pub use error::{AuthError, AuthResult};
pub use guards::AdminSession;
pub use header::{PresentedPair, TokenPair};
pub use passwords::PasswordService;
pub use session_store::{MemorySessionStore, PgSessionStore, SessionStore};

#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub password_service: Arc<PasswordService>,
    pub authenticator: Arc<SessionAuthenticator>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        password_service: PasswordService,
        sessions: Arc<dyn SessionStore>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let authenticator = SessionAuthenticator::new(&config, sessions, credentials);
        Self {
            config,
            password_service: Arc::new(password_service),
            authenticator: Arc::new(authenticator),
        }
    }

    /// Process-local stores; sessions do not survive a restart.
    pub fn in_memory(config: AuthConfig) -> AuthResult<Self> {
        Ok(Self::new(
            config,
            PasswordService::new()?,
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryCredentialStore::new()),
        ))
    }

    pub fn postgres(config: AuthConfig, pool: PgPool) -> AuthResult<Self> {
        Ok(Self::new(
            config,
            PasswordService::new()?,
            Arc::new(PgSessionStore::new(pool.clone())),
            Arc::new(PgCredentialStore::new(pool)),
        ))
    }

    /// Creates the configured bootstrap administrator unless an account with
    /// that id already exists. Returns whether an account was created.
    pub async fn ensure_bootstrap_admin(&self, admin: &BootstrapAdmin) -> AuthResult<bool> {
        let credentials = self.authenticator.credentials();
        if credentials.identity_exists(&admin.id).await? {
            log::info!("bootstrap admin {} already exists", admin.id);
            return Ok(false);
        }
        if let Some(violation) = passwords::password_policy_violation(&admin.password) {
            return Err(AuthError::Config(format!(
                "BOARD_BOOTSTRAP_ADMIN_PASSWORD rejected: {violation}"
            )));
        }

        let identity = Identity {
            id: admin.id.clone(),
            secret_hash: self.password_service.hash_password(&admin.password)?,
            display_name: admin.name.clone(),
            email: None,
            phone: None,
        };
        match credentials.insert_identity(&identity).await {
            Ok(()) => {
                log::info!("bootstrap admin {} created", admin.id);
                Ok(true)
            }
            Err(AuthError::IdentityExists(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
