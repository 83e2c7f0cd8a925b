//! Session lifecycle: issuance, verification, rotation and revocation of
//! access/refresh token pairs bound to a stored session row.
//!
//! Access tokens are verified statelessly on every request. The session row
//! is consulted only on the reissue path, where the presented pair must match
//! the stored pair verbatim; any mismatch kills the session.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::codec::{ClaimSet, SessionClaims, SignedToken, SigningSecret, TokenCodec};
use crate::auth::credentials::CredentialStore;
use crate::auth::header::TokenPair;
use crate::auth::session_store::{Session, SessionStore};
use crate::auth::{AuthConfig, AuthError, AuthResult};

/// A newly created session and the claims of its first access token.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session: Session,
    pub access_claims: SessionClaims,
}

impl IssuedSession {
    pub fn pair(&self) -> TokenPair {
        TokenPair {
            access_token: self.session.access_token.clone(),
            refresh_token: self.session.refresh_token.clone(),
        }
    }
}

/// Result of a successful reissue.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub pair: TokenPair,
    pub access_claims: SessionClaims,
}

pub struct SessionAuthenticator {
    codec: TokenCodec,
    access_secret: SigningSecret,
    refresh_secret: SigningSecret,
    access_ttl: Duration,
    refresh_ttl: Duration,
    sessions: Arc<dyn SessionStore>,
    credentials: Arc<dyn CredentialStore>,
}

impl SessionAuthenticator {
    pub fn new(
        config: &AuthConfig,
        sessions: Arc<dyn SessionStore>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            codec: TokenCodec::new(config.issuer.clone()),
            access_secret: SigningSecret::new(config.access_secret.as_bytes()),
            refresh_secret: SigningSecret::new(config.refresh_secret.as_bytes()),
            access_ttl: Duration::seconds(config.access_token_ttl_secs),
            refresh_ttl: Duration::seconds(config.refresh_token_ttl_secs),
            sessions,
            credentials,
        }
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Starts a new session for `identity_id` and persists its token pair.
    ///
    /// Both tokens are signed before anything is written, so a failure never
    /// leaves a half-issued pair in the store.
    pub async fn create_session(&self, identity_id: &str) -> AuthResult<IssuedSession> {
        let display_name = self.display_name(identity_id).await?;
        let session_id = Uuid::new_v4();

        let access = self
            .codec
            .issue(
                &ClaimSet {
                    session_id,
                    identity_id: identity_id.to_string(),
                    display_name: display_name.clone(),
                    authorized: Some(true),
                },
                &self.access_secret,
                self.access_ttl,
            )
            .map_err(AuthError::from_access)?;

        let refresh = self
            .codec
            .issue(
                &ClaimSet {
                    session_id,
                    identity_id: identity_id.to_string(),
                    display_name,
                    authorized: None,
                },
                &self.refresh_secret,
                self.refresh_ttl,
            )
            .map_err(AuthError::from_refresh)?;

        let session = Session {
            session_id,
            identity_id: identity_id.to_string(),
            access_token: access.token,
            refresh_token: refresh.token,
            refresh_expires_at: refresh.claims.expires_at(),
        };
        self.sessions.insert(&session).await?;

        log::info!("session {} created for admin {}", session_id, identity_id);
        Ok(IssuedSession {
            session,
            access_claims: access.claims,
        })
    }

    /// Stateless check of an access token. Never touches the session store.
    pub fn verify_access(&self, token: &str) -> AuthResult<SessionClaims> {
        self.codec
            .parse(token, &self.access_secret)
            .map_err(AuthError::from_access)
    }

    pub fn verify_refresh(&self, token: &str) -> AuthResult<SessionClaims> {
        self.codec
            .parse(token, &self.refresh_secret)
            .map_err(AuthError::from_refresh)
    }

    /// Verifies an access token and additionally requires that it is the
    /// current access token of a live session.
    pub async fn verify_session(&self, token: &str) -> AuthResult<SessionClaims> {
        let claims = self.verify_access(token)?;
        let session = self
            .sessions
            .find(claims.sid)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if !constant_time_eq(session.access_token.as_bytes(), token.as_bytes()) {
            return Err(AuthError::AccessInvalid);
        }
        Ok(claims)
    }

    /// Issues a fresh access token for an existing session and records it as
    /// the session's current access token. The refresh token is untouched.
    pub async fn rotate_access(
        &self,
        session_id: Uuid,
        identity_id: &str,
    ) -> AuthResult<SignedToken> {
        let display_name = self.display_name(identity_id).await?;

        let access = self
            .codec
            .issue(
                &ClaimSet {
                    session_id,
                    identity_id: identity_id.to_string(),
                    display_name,
                    authorized: Some(true),
                },
                &self.access_secret,
                self.access_ttl,
            )
            .map_err(AuthError::from_access)?;

        // Concurrent rotations race here; the last write wins.
        if !self
            .sessions
            .update_access_token(session_id, &access.token)
            .await?
        {
            return Err(AuthError::SessionNotFound);
        }

        log::debug!("session {} access token rotated", session_id);
        Ok(access)
    }

    /// Succeeds only when both presented tokens equal the stored pair.
    /// A missing row counts as a mismatch.
    pub async fn verify_pair_consistency(
        &self,
        session_id: Uuid,
        access_token: &str,
        refresh_token: &str,
    ) -> AuthResult<()> {
        let session = self
            .sessions
            .find(session_id)
            .await?
            .ok_or(AuthError::TokenReuseDetected)?;

        let access_matches =
            constant_time_eq(session.access_token.as_bytes(), access_token.as_bytes());
        let refresh_matches =
            constant_time_eq(session.refresh_token.as_bytes(), refresh_token.as_bytes());

        if access_matches && refresh_matches {
            Ok(())
        } else {
            Err(AuthError::TokenReuseDetected)
        }
    }

    /// Deletes the session row. Deleting an absent session succeeds.
    pub async fn revoke(&self, session_id: Uuid) -> AuthResult<()> {
        match self.sessions.delete(session_id).await {
            Ok(removed) => {
                if removed {
                    log::info!("session {} revoked", session_id);
                }
                Ok(())
            }
            Err(err) => {
                log::error!("failed to revoke session {}: {}", session_id, err);
                Err(err)
            }
        }
    }

    /// Exchanges a presented pair for a fresh access token.
    ///
    /// A refresh token that fails verification, or a pair that no longer
    /// matches the stored one, terminates the session. For a rejected refresh
    /// token that is any session its claims name, whether or not the
    /// signature verifies.
    pub async fn reissue(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> AuthResult<IssuedTokens> {
        if refresh_token.is_empty() {
            return Err(AuthError::MissingRefreshToken);
        }

        let claims = match self.verify_refresh(refresh_token) {
            Ok(claims) => claims,
            Err(err) => {
                if let Ok(named) = self.codec.peek_claims(refresh_token) {
                    log::warn!(
                        "refresh token for session {} rejected ({}), revoking",
                        named.sid,
                        err.reason()
                    );
                    let _ = self.revoke(named.sid).await;
                }
                return Err(err);
            }
        };

        match self
            .verify_pair_consistency(claims.sid, access_token, refresh_token)
            .await
        {
            Ok(()) => {}
            Err(AuthError::TokenReuseDetected) => {
                log::warn!(
                    "token reuse detected for session {} (admin {}), revoking",
                    claims.sid,
                    claims.sub
                );
                let _ = self.revoke(claims.sid).await;
                return Err(AuthError::TokenReuseDetected);
            }
            Err(err) => return Err(err),
        }

        let access = self.rotate_access(claims.sid, &claims.sub).await?;

        Ok(IssuedTokens {
            pair: TokenPair {
                access_token: access.token,
                refresh_token: refresh_token.to_string(),
            },
            access_claims: access.claims,
        })
    }

    /// Ends the session named by the presented pair.
    ///
    /// The refresh component identifies the session when present, otherwise
    /// the access component does. Expired tokens are accepted; forged ones
    /// are not.
    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> AuthResult<Uuid> {
        let claims = if !refresh_token.is_empty() {
            self.codec
                .parse_ignoring_expiry(refresh_token, &self.refresh_secret)
                .map_err(AuthError::from_refresh)?
        } else if !access_token.is_empty() {
            self.codec
                .parse_ignoring_expiry(access_token, &self.access_secret)
                .map_err(AuthError::from_access)?
        } else {
            return Err(AuthError::MissingAccessToken);
        };

        self.revoke(claims.sid).await?;
        log::info!("admin {} logged out of session {}", claims.sub, claims.sid);
        Ok(claims.sid)
    }

    /// Revokes every session owned by `identity_id`.
    pub async fn revoke_identity(&self, identity_id: &str) -> AuthResult<u64> {
        let removed = self.sessions.delete_for_identity(identity_id).await?;
        if removed > 0 {
            log::info!("revoked {} sessions for admin {}", removed, identity_id);
        }
        Ok(removed)
    }

    /// Drops sessions whose refresh token can no longer be used.
    pub async fn purge_expired(&self) -> AuthResult<u64> {
        self.sessions.purge_expired(Utc::now()).await
    }

    async fn display_name(&self, identity_id: &str) -> AuthResult<String> {
        self.credentials
            .find_identity(identity_id)
            .await?
            .map(|identity| identity.display_name)
            .ok_or_else(|| AuthError::IdentityLookupFailed(identity_id.to_string()))
    }
}

/// Constant-time comparison to avoid timing side-channels.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}
