//! HTTP route handlers outside the authentication core.
//!
//! Handlers are annotated with `#[openapi]` so `rocket_okapi` can derive
//! an OpenAPI document automatically.

pub mod admin;
pub mod health;
