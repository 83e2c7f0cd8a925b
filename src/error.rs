use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse, Responses};
use rocket_okapi::response::OpenApiResponderInner;
use serde::Serialize;
use std::io::Cursor;

use crate::accounts::AdminValidation;
use crate::auth::AuthError;

#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    NotFound(String),
    Validation(AdminValidation),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<AdminValidation>,
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let mut fields = None;
        let (status, error_type, message) = match self {
            ApiError::Auth(e) => {
                let status = e.status();
                if status == Status::InternalServerError {
                    log::error!("auth error: {}", e);
                }
                (status, e.reason(), e.to_string())
            }
            ApiError::NotFound(msg) => {
                log::debug!("not found: {}", msg);
                (Status::NotFound, "NotFound", msg)
            }
            ApiError::Validation(result) => {
                log::debug!("validation failed: {:?}", result);
                fields = Some(result);
                (
                    Status::UnprocessableEntity,
                    "ValidationFailed",
                    "admin account is invalid".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
            fields,
        };

        let json = serde_json::to_string(&error_response)
            .unwrap_or_else(|_| r#"{"error":"SerializationError","message":"Failed to serialize error"}"#.to_string());

        Response::build()
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

impl OpenApiResponderInner for ApiError {
    fn responses(_generator: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        let mut responses = Responses::default();
        for (code, description) in [
            ("401", "Missing, expired or invalid access token"),
            ("404", "Resource not found"),
            ("409", "Resource already exists"),
            ("422", "Validation failed; `fields` holds per-field messages"),
            ("500", "Internal error"),
        ] {
            responses.responses.insert(
                code.to_string(),
                RefOr::Object(OpenApiResponse {
                    description: description.to_string(),
                    ..Default::default()
                }),
            );
        }
        Ok(responses)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}
