use argon2::{
    Algorithm, Argon2, ParamsBuilder, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::RngCore;

use crate::auth::{AuthError, AuthResult};

const SALT_LEN: usize = 16;
const MIN_PASSWORD_LEN: usize = 8;

/// Argon2id hashing for administrator passwords.
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
    /// Verified against when the admin id is unknown so both paths cost the same.
    decoy_hash: String,
}

impl PasswordService {
    pub fn new() -> AuthResult<Self> {
        let mut builder = ParamsBuilder::new();
        builder.m_cost(19 * 1024); // 19 MiB
        builder.t_cost(2);
        builder.p_cost(1);
        let params = builder.build().map_err(AuthError::from)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut service = Self {
            argon2,
            decoy_hash: String::new(),
        };
        service.decoy_hash = service.hash_password("decoy-password")?;
        Ok(service)
    }

    pub fn hash_password(&self, password: &str) -> AuthResult<String> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes).map_err(AuthError::from)?;
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(AuthError::from)?
            .to_string();
        Ok(hash)
    }

    pub fn verify_password(&self, password: &str, encoded: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(encoded)?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(AuthError::from(err)),
        }
    }

    /// Verifies `password` against `encoded`, or against the decoy hash when
    /// there is no stored hash. Always `false` in the latter case.
    pub fn verify_or_decoy(&self, password: &str, encoded: Option<&str>) -> AuthResult<bool> {
        match encoded {
            Some(encoded) => self.verify_password(password, encoded),
            None => {
                self.verify_password(password, &self.decoy_hash)?;
                Ok(false)
            }
        }
    }
}

/// Returns a user-facing message when the password is too weak.
///
/// A strong password has at least eight characters and mixes upper case,
/// lower case, digits and symbols.
pub fn password_policy_violation(password: &str) -> Option<String> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let has_upper = password.chars().any(char::is_uppercase);
    let has_lower = password.chars().any(char::is_lowercase);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password
        .chars()
        .any(|c| c.is_ascii_punctuation() || (!c.is_alphanumeric() && !c.is_whitespace()));

    if long_enough && has_upper && has_lower && has_digit && has_symbol {
        None
    } else {
        Some(
            "password must be at least 8 characters and include upper case, lower case, digit and symbol"
                .into(),
        )
    }
}
