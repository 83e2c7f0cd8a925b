//! Administrator account provisioning on top of the credential store.

use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::auth::credentials::{Identity, IdentityField};
use crate::auth::passwords::password_policy_violation;
use crate::auth::{AuthResult, AuthState};
use crate::error::ApiError;

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]{5,19}$").expect("valid id pattern"));
static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\p{L}+( \p{L}+)*$").expect("valid name pattern"));
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-zA-Z]([-_.]?[0-9a-zA-Z])*@[0-9a-zA-Z]([-_.]?[0-9a-zA-Z])*\.[a-zA-Z]{2,}$")
        .expect("valid email pattern")
});
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3}-\d{3,4}-\d{4}$").expect("valid phone pattern"));

/// Registration payload for a new administrator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NewAdmin {
    pub id: String,
    pub pw: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Replacement profile for an existing administrator. The id comes from the path.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdateAdmin {
    pub pw: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Per-field validation messages; `None` means the field is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AdminValidation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl AdminValidation {
    pub fn is_valid(&self) -> bool {
        self.id.is_none()
            && self.pw.is_none()
            && self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
    }
}

pub async fn validate_new_admin(state: &AuthState, admin: &NewAdmin) -> AuthResult<AdminValidation> {
    let credentials = state.authenticator.credentials();
    let mut result = AdminValidation::default();

    if !ID_PATTERN.is_match(&admin.id) {
        result.id = Some("id must be 6-20 lowercase letters or digits, starting with a letter".into());
    } else if credentials.identity_exists(&admin.id).await? {
        result.id = Some("id is already taken".into());
    }

    result.pw = password_policy_violation(&admin.pw);
    result.name = check_name(&admin.name);
    result.email = check_email(state, &admin.email).await?;
    result.phone = check_phone(state, &admin.phone).await?;

    Ok(result)
}

/// Validates a profile update. Email and phone are only checked for
/// uniqueness when they differ from the stored values.
pub async fn validate_admin_update(
    state: &AuthState,
    existing: &Identity,
    update: &UpdateAdmin,
) -> AuthResult<AdminValidation> {
    let mut result = AdminValidation {
        pw: password_policy_violation(&update.pw),
        name: check_name(&update.name),
        ..AdminValidation::default()
    };

    if existing.email.as_deref() != Some(update.email.as_str()) {
        result.email = check_email(state, &update.email).await?;
    }
    if existing.phone.as_deref() != Some(update.phone.as_str()) {
        result.phone = check_phone(state, &update.phone).await?;
    }

    Ok(result)
}

fn check_name(name: &str) -> Option<String> {
    if NAME_PATTERN.is_match(name.trim()) {
        None
    } else {
        Some("name may only contain letters".into())
    }
}

async fn check_email(state: &AuthState, email: &str) -> AuthResult<Option<String>> {
    if !EMAIL_PATTERN.is_match(email) {
        return Ok(Some("email is not a valid address".into()));
    }
    let taken = state
        .authenticator
        .credentials()
        .is_taken(IdentityField::Email, email)
        .await?;
    Ok(taken.then(|| "email is already in use".into()))
}

async fn check_phone(state: &AuthState, phone: &str) -> AuthResult<Option<String>> {
    if !PHONE_PATTERN.is_match(phone) {
        return Ok(Some("phone must look like 010-1234-5678".into()));
    }
    let taken = state
        .authenticator
        .credentials()
        .is_taken(IdentityField::Phone, phone)
        .await?;
    Ok(taken.then(|| "phone is already in use".into()))
}

pub async fn register_admin(state: &AuthState, admin: &NewAdmin) -> Result<Identity, ApiError> {
    let validation = validate_new_admin(state, admin).await?;
    if !validation.is_valid() {
        return Err(ApiError::Validation(validation));
    }

    let identity = Identity {
        id: admin.id.clone(),
        secret_hash: state.password_service.hash_password(&admin.pw)?,
        display_name: admin.name.trim().to_string(),
        email: Some(admin.email.clone()),
        phone: Some(admin.phone.clone()),
    };
    state
        .authenticator
        .credentials()
        .insert_identity(&identity)
        .await?;

    Ok(identity)
}

/// Replaces the password, name, email and phone of an existing administrator.
///
/// Live sessions keep the name they were issued with until their next reissue.
pub async fn update_admin(
    state: &AuthState,
    id: &str,
    update: &UpdateAdmin,
) -> Result<Identity, ApiError> {
    let credentials = state.authenticator.credentials();
    let existing = credentials
        .find_identity(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("admin '{id}' not found")))?;

    let validation = validate_admin_update(state, &existing, update).await?;
    if !validation.is_valid() {
        return Err(ApiError::Validation(validation));
    }

    let identity = Identity {
        id: existing.id,
        secret_hash: state.password_service.hash_password(&update.pw)?,
        display_name: update.name.trim().to_string(),
        email: Some(update.email.clone()),
        phone: Some(update.phone.clone()),
    };
    if !credentials.update_identity(&identity).await? {
        return Err(ApiError::NotFound(format!("admin '{id}' not found")));
    }

    Ok(identity)
}

/// Removes an administrator and every session they hold.
pub async fn delete_admin(state: &AuthState, id: &str) -> Result<(), ApiError> {
    let revoked = state.authenticator.revoke_identity(id).await?;
    let removed = state.authenticator.credentials().delete_identity(id).await?;
    if !removed {
        return Err(ApiError::NotFound(format!("admin '{id}' not found")));
    }

    log::info!("admin {} deleted ({} sessions revoked)", id, revoked);
    Ok(())
}
