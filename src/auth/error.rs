use rocket::http::Status;
use thiserror::Error;

use crate::auth::codec::TokenError;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("identity lookup failed for admin {0}")]
    IdentityLookupFailed(String),
    #[error("token signing failed: {0}")]
    SigningFailed(String),
    #[error("refresh token is empty")]
    MissingRefreshToken,
    #[error("access token is empty")]
    MissingAccessToken,
    #[error("refresh token is expired")]
    RefreshExpired,
    #[error("invalid refresh token")]
    RefreshInvalid,
    #[error("token pair does not match the active session")]
    TokenReuseDetected,
    #[error("access token is expired")]
    AccessExpired,
    #[error("invalid access token")]
    AccessInvalid,
    #[error("session not found")]
    SessionNotFound,
    #[error("session {0} already exists")]
    SessionConflict(uuid::Uuid),
    #[error("admin {0} already exists")]
    IdentityExists(String),
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] rocket_db_pools::sqlx::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("argon2 parameter error: {0}")]
    Argon2(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
}

impl AuthError {
    pub fn status(&self) -> Status {
        match self {
            AuthError::InvalidCredentials
            | AuthError::MissingRefreshToken
            | AuthError::MissingAccessToken
            | AuthError::RefreshExpired
            | AuthError::RefreshInvalid
            | AuthError::TokenReuseDetected
            | AuthError::AccessExpired
            | AuthError::AccessInvalid
            | AuthError::SessionNotFound => Status::Unauthorized,
            AuthError::IdentityLookupFailed(_) => Status::Unauthorized,
            AuthError::IdentityExists(_) => Status::Conflict,
            AuthError::SigningFailed(_)
            | AuthError::SessionConflict(_)
            | AuthError::PersistenceFailure(_)
            | AuthError::Config(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_) => Status::InternalServerError,
        }
    }

    /// Stable machine-readable code surfaced to clients alongside the status.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::IdentityLookupFailed(_) => "identity_lookup_failed",
            AuthError::SigningFailed(_) => "signing_failed",
            AuthError::MissingRefreshToken => "missing_refresh_token",
            AuthError::MissingAccessToken => "missing_access_token",
            AuthError::RefreshExpired => "refresh_expired",
            AuthError::RefreshInvalid => "refresh_invalid",
            AuthError::TokenReuseDetected => "token_reuse_detected",
            AuthError::AccessExpired => "access_expired",
            AuthError::AccessInvalid => "access_invalid",
            AuthError::SessionNotFound => "session_not_found",
            AuthError::SessionConflict(_) => "session_conflict",
            AuthError::IdentityExists(_) => "identity_exists",
            AuthError::PersistenceFailure(_) => "persistence_failure",
            AuthError::Config(_) => "config_error",
            AuthError::Argon2(_) | AuthError::PasswordHash(_) => "password_hash_error",
        }
    }

    pub(crate) fn from_access(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::AccessExpired,
            TokenError::InvalidSignature | TokenError::Malformed => AuthError::AccessInvalid,
            TokenError::Signing(msg) => AuthError::SigningFailed(msg),
        }
    }

    pub(crate) fn from_refresh(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::RefreshExpired,
            TokenError::InvalidSignature | TokenError::Malformed => AuthError::RefreshInvalid,
            TokenError::Signing(msg) => AuthError::SigningFailed(msg),
        }
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::Argon2(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}
