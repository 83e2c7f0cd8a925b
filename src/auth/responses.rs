use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoginRequest {
    pub id: String,
    pub pw: String,
}

/// Body returned alongside a freshly issued pair. The tokens themselves
/// travel only in the `Authorization` response header.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub admin_id: String,
    pub name: String,
    pub access_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AuthErrorResponse {
    pub status: u16,
    pub reason: String,
    pub message: String,
}
