//! Signed, expiring claim sets encoded as HS256 JWTs.
//!
//! The codec holds no secrets of its own: callers pass the [`SigningSecret`]
//! for the token family they are issuing or parsing, which keeps access and
//! refresh tokens mutually unacceptable.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token signature invalid")]
    InvalidSignature,
    #[error("token malformed")]
    Malformed,
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm
            | ErrorKind::InvalidIssuer
            | ErrorKind::ImmatureSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// Claims a caller asks the codec to sign. Timing fields are added at issue time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSet {
    pub session_id: Uuid,
    pub identity_id: String,
    pub display_name: String,
    pub authorized: Option<bool>,
}

/// Claims embedded in every token, access and refresh alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sid: Uuid,
    pub sub: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized: Option<bool>,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

impl SessionClaims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub claims: SessionClaims,
}

/// HMAC key material for one token family.
#[derive(Clone)]
pub struct SigningSecret {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SigningSecret {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct TokenCodec {
    issuer: String,
    validation: Validation,
    signature_only: Validation,
    unverified: Validation,
}

impl TokenCodec {
    pub fn new(issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(ALGORITHM);
        validation.set_issuer(&[issuer.clone()]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.leeway = 0;

        let mut signature_only = validation.clone();
        signature_only.validate_exp = false;

        let mut unverified = Validation::new(ALGORITHM);
        unverified.insecure_disable_signature_validation();
        unverified.validate_exp = false;
        unverified.required_spec_claims.clear();

        Self {
            issuer,
            validation,
            signature_only,
            unverified,
        }
    }

    pub fn issue(
        &self,
        claims: &ClaimSet,
        secret: &SigningSecret,
        ttl: Duration,
    ) -> Result<SignedToken, TokenError> {
        let now = Utc::now();
        let expires_at = now + ttl;

        let claims = SessionClaims {
            sid: claims.session_id,
            sub: claims.identity_id.clone(),
            name: claims.display_name.clone(),
            authorized: claims.authorized,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(ALGORITHM), &claims, &secret.encoding_key)
            .map_err(|err| TokenError::Signing(err.to_string()))?;

        Ok(SignedToken { token, claims })
    }

    pub fn parse(&self, token: &str, secret: &SigningSecret) -> Result<SessionClaims, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Malformed);
        }
        let data = decode::<SessionClaims>(token, &secret.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    /// Verifies signature, algorithm and issuer but accepts expired tokens.
    ///
    /// Used where a session must be identified from a token whose lifetime is
    /// over, e.g. revoking the session behind an expired refresh token.
    pub fn parse_ignoring_expiry(
        &self,
        token: &str,
        secret: &SigningSecret,
    ) -> Result<SessionClaims, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Malformed);
        }
        let data = decode::<SessionClaims>(token, &secret.decoding_key, &self.signature_only)?;
        Ok(data.claims)
    }

    /// Reads the claims of a token without checking its signature, issuer or
    /// expiry. The result must never grant access; it only names the session a
    /// rejected token claims to belong to.
    pub fn peek_claims(&self, token: &str) -> Result<SessionClaims, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Malformed);
        }
        let data =
            decode::<SessionClaims>(token, &DecodingKey::from_secret(&[]), &self.unverified)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUER: &str = "board-test";

    fn claim_set() -> ClaimSet {
        ClaimSet {
            session_id: Uuid::new_v4(),
            identity_id: "admin1".into(),
            display_name: "Admin One".into(),
            authorized: Some(true),
        }
    }

    #[test]
    fn issues_and_parses_tokens() {
        let codec = TokenCodec::new(ISSUER);
        let secret = SigningSecret::new(b"access-secret");
        let claims = claim_set();

        let signed = codec
            .issue(&claims, &secret, Duration::minutes(15))
            .expect("issue token");
        let parsed = codec.parse(&signed.token, &secret).expect("parse token");

        assert_eq!(parsed, signed.claims);
        assert_eq!(parsed.sid, claims.session_id);
        assert_eq!(parsed.sub, "admin1");
        assert_eq!(parsed.name, "Admin One");
        assert_eq!(parsed.authorized, Some(true));
        assert_eq!(parsed.exp - parsed.iat, 15 * 60);
    }

    #[test]
    fn consecutive_tokens_differ() {
        let codec = TokenCodec::new(ISSUER);
        let secret = SigningSecret::new(b"access-secret");
        let claims = claim_set();

        let first = codec.issue(&claims, &secret, Duration::minutes(1)).unwrap();
        let second = codec.issue(&claims, &secret, Duration::minutes(1)).unwrap();
        assert_ne!(first.token, second.token);
    }

    #[test]
    fn expired_token_reports_expired_not_invalid() {
        let codec = TokenCodec::new(ISSUER);
        let secret = SigningSecret::new(b"access-secret");

        let signed = codec
            .issue(&claim_set(), &secret, Duration::seconds(-30))
            .expect("issue token");

        assert_eq!(codec.parse(&signed.token, &secret), Err(TokenError::Expired));

        let claims = codec
            .parse_ignoring_expiry(&signed.token, &secret)
            .expect("signature still verifies");
        assert_eq!(claims, signed.claims);
    }

    #[test]
    fn token_from_other_family_is_rejected() {
        let codec = TokenCodec::new(ISSUER);
        let access = SigningSecret::new(b"access-secret");
        let refresh = SigningSecret::new(b"refresh-secret");

        let signed = codec
            .issue(&claim_set(), &refresh, Duration::days(3))
            .expect("issue token");

        assert_eq!(
            codec.parse(&signed.token, &access),
            Err(TokenError::InvalidSignature)
        );
        assert_eq!(
            codec.parse_ignoring_expiry(&signed.token, &access),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn rejects_other_algorithms_with_same_secret() {
        let codec = TokenCodec::new(ISSUER);
        let secret = SigningSecret::new(b"access-secret");
        let signed = codec
            .issue(&claim_set(), &secret, Duration::minutes(5))
            .unwrap();

        let forged = encode(
            &Header::new(Algorithm::HS512),
            &signed.claims,
            &EncodingKey::from_secret(b"access-secret"),
        )
        .unwrap();

        assert_eq!(codec.parse(&forged, &secret), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn rejects_unsigned_and_garbage_tokens() {
        let codec = TokenCodec::new(ISSUER);
        let secret = SigningSecret::new(b"access-secret");

        // {"alg":"none","typ":"JWT"}.{"sub":"admin1"}.
        let unsigned = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.eyJzdWIiOiJhZG1pbjEifQ.";
        assert!(codec.parse(unsigned, &secret).is_err());
        assert_eq!(codec.parse("not-a-token", &secret), Err(TokenError::Malformed));
        assert_eq!(codec.parse("", &secret), Err(TokenError::Malformed));
    }

    #[test]
    fn tampered_payload_fails_signature() {
        let codec = TokenCodec::new(ISSUER);
        let secret = SigningSecret::new(b"access-secret");
        let signed = codec
            .issue(&claim_set(), &secret, Duration::minutes(5))
            .unwrap();

        let mut other = signed.claims.clone();
        other.sub = "intruder".into();
        let resigned = encode(
            &Header::new(ALGORITHM),
            &other,
            &EncodingKey::from_secret(b"another-secret"),
        )
        .unwrap();

        let mut parts: Vec<&str> = signed.token.split('.').collect();
        let forged_payload = resigned.split('.').nth(1).unwrap();
        parts[1] = forged_payload;
        let forged = parts.join(".");

        assert_eq!(codec.parse(&forged, &secret), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn peek_reads_claims_of_forged_and_expired_tokens() {
        let codec = TokenCodec::new(ISSUER);
        let secret = SigningSecret::new(b"access-secret");
        let claims = claim_set();

        let forged = TokenCodec::new("someone-else")
            .issue(&claims, &SigningSecret::new(b"guessed"), Duration::seconds(-30))
            .unwrap();
        assert_eq!(
            codec.parse_ignoring_expiry(&forged.token, &secret),
            Err(TokenError::InvalidSignature)
        );

        let peeked = codec.peek_claims(&forged.token).expect("claims are readable");
        assert_eq!(peeked.sid, claims.session_id);
        assert_eq!(peeked.iss, "someone-else");

        assert_eq!(codec.peek_claims("not-a-token"), Err(TokenError::Malformed));
        assert_eq!(codec.peek_claims(""), Err(TokenError::Malformed));
    }

    #[test]
    fn rejects_foreign_issuer() {
        let secret = SigningSecret::new(b"access-secret");
        let signed = TokenCodec::new("someone-else")
            .issue(&claim_set(), &secret, Duration::minutes(5))
            .unwrap();

        assert_eq!(
            TokenCodec::new(ISSUER).parse(&signed.token, &secret),
            Err(TokenError::InvalidSignature)
        );
    }
}
