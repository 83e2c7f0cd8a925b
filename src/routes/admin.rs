//! Administrator account management. Every endpoint sits behind the admin gate.

use rocket::http::Status;
use rocket::response::status;
use rocket::{State, delete, post, put, serde::json::Json};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

use crate::accounts::{self, NewAdmin, UpdateAdmin};
use crate::auth::credentials::Identity;
use crate::auth::{AdminSession, AuthState};
use crate::error::ApiError;
use crate::models::ApiResponse;

/// Public view of an administrator account.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AdminSummary {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl From<Identity> for AdminSummary {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            name: identity.display_name,
            email: identity.email,
            phone: identity.phone,
        }
    }
}

/// Register another administrator.
///
/// Responds with 422 and per-field messages when the payload is rejected.
#[openapi(tag = "Admin")]
#[post("/admin", data = "<payload>")]
pub async fn register_admin(
    session: AdminSession,
    state: &State<AuthState>,
    payload: Json<NewAdmin>,
) -> Result<status::Custom<Json<ApiResponse<AdminSummary>>>, ApiError> {
    let identity = accounts::register_admin(state, &payload).await?;
    log::info!("admin {} registered by {}", identity.id, session.admin_id());

    Ok(status::Custom(
        Status::Created,
        Json(ApiResponse::new(AdminSummary::from(identity))),
    ))
}

/// Replace an administrator's password, name, email and phone.
///
/// Email and phone only need to be unique when they change. A new name shows
/// up in the admin's tokens from their next reissue on.
#[openapi(tag = "Admin")]
#[put("/admin/<id>", data = "<payload>")]
pub async fn update_admin(
    session: AdminSession,
    state: &State<AuthState>,
    id: &str,
    payload: Json<UpdateAdmin>,
) -> Result<Json<ApiResponse<AdminSummary>>, ApiError> {
    let identity = accounts::update_admin(state, id, &payload).await?;
    log::info!("admin {} updated by {}", identity.id, session.admin_id());

    Ok(Json(ApiResponse::new(AdminSummary::from(identity))))
}

/// Delete an administrator and revoke all of their sessions.
#[openapi(tag = "Admin")]
#[delete("/admin/<id>")]
pub async fn delete_admin(
    _session: AdminSession,
    state: &State<AuthState>,
    id: &str,
) -> Result<status::NoContent, ApiError> {
    accounts::delete_admin(state, id).await?;
    Ok(status::NoContent)
}
