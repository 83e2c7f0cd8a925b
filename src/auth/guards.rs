use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{Request, State, catch};
use rocket_okapi::request::OpenApiFromRequest;

use crate::auth::codec::SessionClaims;
use crate::auth::header::{AUTHORIZATION, PresentedPair};
use crate::auth::responses::AuthErrorResponse;
use crate::auth::{AuthError, AuthResult, AuthState};

/// An administrator whose access token verified. Stateless: the session
/// row is not consulted, so a revoked session keeps passing until its access
/// token expires.
#[derive(Debug, Clone, OpenApiFromRequest)]
pub struct AdminSession {
    pub claims: SessionClaims,
}

impl AdminSession {
    pub fn admin_id(&self) -> &str {
        &self.claims.sub
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminSession {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match authorize(request).await {
            Ok(claims) => Outcome::Success(AdminSession { claims }),
            Err(err) => {
                log::debug!("admin gate rejected {}: {}", request.uri(), err.reason());
                request.local_cache(|| {
                    Some(GateRejection {
                        reason: err.reason(),
                        message: err.to_string(),
                        status: err.status(),
                    })
                });
                Outcome::Error((err.status(), err))
            }
        }
    }
}

async fn authorize(request: &Request<'_>) -> AuthResult<SessionClaims> {
    let state = request
        .guard::<&State<AuthState>>()
        .await
        .succeeded()
        .ok_or_else(|| AuthError::Config("AuthState missing from state".into()))?;

    let header = request.headers().get_one(AUTHORIZATION).unwrap_or_default();
    let pair = PresentedPair::parse(header);
    if pair.access.is_empty() {
        return Err(AuthError::MissingAccessToken);
    }

    state.authenticator.verify_access(pair.access)
}

/// The raw `Authorization` value, empty when the header is absent.
#[derive(Debug, Clone, Default, OpenApiFromRequest)]
pub struct RawAuthorization(pub String);

impl RawAuthorization {
    pub fn pair(&self) -> PresentedPair<'_> {
        PresentedPair::parse(&self.0)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RawAuthorization {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let value = request.headers().get_one(AUTHORIZATION).unwrap_or_default();
        Outcome::Success(RawAuthorization(value.to_string()))
    }
}

/// Why the admin gate turned a request away, kept for the 401 catcher.
#[derive(Debug, Clone)]
struct GateRejection {
    reason: &'static str,
    message: String,
    status: Status,
}

#[catch(401)]
pub fn unauthorized(request: &Request<'_>) -> status::Custom<Json<AuthErrorResponse>> {
    let body = match request.local_cache(|| None::<GateRejection>) {
        Some(rejection) => AuthErrorResponse {
            status: rejection.status.code,
            reason: rejection.reason.to_string(),
            message: rejection.message.clone(),
        },
        None => AuthErrorResponse {
            status: Status::Unauthorized.code,
            reason: "unauthorized".into(),
            message: "authentication required".into(),
        },
    };
    status::Custom(Status::Unauthorized, Json(body))
}
