use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Data, Request, Response};
use std::time::Instant;

use crate::auth::header::{AUTHORIZATION, PresentedPair};

/// Fairing to log one line per HTTP request with timing and which token
/// components the client presented. Token values are never logged.
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        request.local_cache(Instant::now);
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let duration = request.local_cache(Instant::now).elapsed();

        log::info!(
            "{} {} [{}] -> {} ({:.2}ms)",
            request.method(),
            request.uri(),
            presented_tokens(request),
            response.status().code,
            duration.as_secs_f64() * 1000.0
        );
    }
}

fn presented_tokens(request: &Request<'_>) -> &'static str {
    let Some(value) = request.headers().get_one(AUTHORIZATION) else {
        return "anonymous";
    };
    let pair = PresentedPair::parse(value);
    match (pair.access.is_empty(), pair.refresh.is_empty()) {
        (false, false) => "pair",
        (false, true) => "access",
        (true, false) => "refresh",
        (true, true) => "anonymous",
    }
}
