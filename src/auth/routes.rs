use rocket::http::{Header, Status};
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{Responder, State, get, post};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::openapi;
use rocket_okapi::response::OpenApiResponderInner;

use crate::auth::codec::SessionClaims;
use crate::auth::guards::RawAuthorization;
use crate::auth::header::{AUTHORIZATION, TokenPair};
use crate::auth::responses::{AuthErrorResponse, LoginRequest, SessionResponse};
use crate::auth::{AuthError, AuthState};

type AuthRouteResult<T> = Result<T, status::Custom<Json<AuthErrorResponse>>>;

/// Session summary with the token pair attached as the `Authorization`
/// response header.
#[derive(Responder)]
pub struct IssuedPair {
    inner: Json<SessionResponse>,
    authorization: Header<'static>,
}

impl IssuedPair {
    fn new(pair: &TokenPair, claims: SessionClaims) -> Self {
        Self {
            inner: Json(session_response(claims)),
            authorization: Header::new(AUTHORIZATION, pair.header_value()),
        }
    }
}

impl OpenApiResponderInner for IssuedPair {
    fn responses(generator: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        Json::<SessionResponse>::responses(generator)
    }
}

#[openapi(tag = "Auth")]
#[post("/admin/login", data = "<payload>")]
pub async fn login(
    state: &State<AuthState>,
    payload: Json<LoginRequest>,
) -> AuthRouteResult<IssuedPair> {
    let admin_id = payload.id.trim();
    if admin_id.is_empty() || payload.pw.is_empty() {
        return Err(respond_message(
            Status::BadRequest,
            "missing_credentials",
            "id and pw are required",
        ));
    }

    let identity = state
        .authenticator
        .credentials()
        .find_identity(admin_id)
        .await
        .map_err(respond_error)?;

    let verified = state
        .password_service
        .verify_or_decoy(
            &payload.pw,
            identity.as_ref().map(|identity| identity.secret_hash.as_str()),
        )
        .map_err(respond_error)?;

    let identity = match identity {
        Some(identity) if verified => identity,
        _ => {
            log::warn!("failed login attempt for admin {}", admin_id);
            return Err(respond_error(AuthError::InvalidCredentials));
        }
    };

    let issued = state
        .authenticator
        .create_session(&identity.id)
        .await
        .map_err(respond_error)?;

    Ok(IssuedPair::new(&issued.pair(), issued.access_claims))
}

/// Trades a valid pair for a new access token. The refresh token is returned
/// unchanged.
#[openapi(tag = "Auth")]
#[post("/admin/auth")]
pub async fn reissue(
    state: &State<AuthState>,
    authorization: RawAuthorization,
) -> AuthRouteResult<IssuedPair> {
    let presented = authorization.pair();
    let issued = state
        .authenticator
        .reissue(presented.access, presented.refresh)
        .await
        .map_err(respond_error)?;

    Ok(IssuedPair::new(&issued.pair, issued.access_claims))
}

#[openapi(tag = "Auth")]
#[post("/admin/logout")]
pub async fn logout(
    state: &State<AuthState>,
    authorization: RawAuthorization,
) -> AuthRouteResult<status::NoContent> {
    let presented = authorization.pair();
    state
        .authenticator
        .logout(presented.access, presented.refresh)
        .await
        .map_err(respond_error)?;

    Ok(status::NoContent)
}

/// Describes the caller's session. Unlike the admin gate this consults the
/// session store, so revoked sessions are rejected immediately.
#[openapi(tag = "Auth")]
#[get("/admin/session")]
pub async fn session(
    state: &State<AuthState>,
    authorization: RawAuthorization,
) -> AuthRouteResult<Json<SessionResponse>> {
    let presented = authorization.pair();
    if presented.access.is_empty() {
        return Err(respond_error(AuthError::MissingAccessToken));
    }

    let claims = state
        .authenticator
        .verify_session(presented.access)
        .await
        .map_err(respond_error)?;

    Ok(Json(session_response(claims)))
}

fn session_response(claims: SessionClaims) -> SessionResponse {
    SessionResponse {
        access_token_expires_at: claims.expires_at(),
        session_id: claims.sid,
        admin_id: claims.sub,
        name: claims.name,
    }
}

fn respond_error(err: AuthError) -> status::Custom<Json<AuthErrorResponse>> {
    let status = err.status();
    if status == Status::InternalServerError {
        log::error!("auth request failed: {}", err);
    }
    status::Custom(
        status,
        Json(AuthErrorResponse {
            status: status.code,
            reason: err.reason().to_string(),
            message: err.to_string(),
        }),
    )
}

fn respond_message(
    status: Status,
    reason: &str,
    message: impl Into<String>,
) -> status::Custom<Json<AuthErrorResponse>> {
    status::Custom(
        status,
        Json(AuthErrorResponse {
            status: status.code,
            reason: reason.to_string(),
            message: message.into(),
        }),
    )
}
