use board_api::auth::codec::{ClaimSet, SigningSecret, TokenCodec};
use board_api::auth::responses::{AuthErrorResponse, SessionResponse};
use board_api::auth::routes::{login, logout, reissue, session};
use board_api::auth::{AuthState, PresentedPair};
use board_api::test_support::{TestRocketBuilder, seed_admin, test_auth_config};
use rocket::http::{Header, Status};
use rocket::local::asynchronous::{Client, LocalResponse};
use chrono::Duration;
use rocket::routes;
use serde_json::json;

const ADMIN_ID: &str = "administrator1";
const ADMIN_PW: &str = "@@Test123456";

async fn client() -> Client {
    let state = AuthState::in_memory(test_auth_config()).expect("auth state");
    seed_admin(&state, ADMIN_ID, ADMIN_PW)
        .await
        .expect("seed admin");

    TestRocketBuilder::new()
        .manage_auth_state(state)
        .mount_api_routes(routes![login, reissue, logout, session])
        .async_client()
        .await
}

fn authorization(response: &LocalResponse<'_>) -> String {
    response
        .headers()
        .get_one("Authorization")
        .expect("Authorization header on response")
        .to_string()
}

async fn login_pair(client: &Client) -> String {
    let response = client
        .post("/api/v1/admin/login")
        .json(&json!({ "id": ADMIN_ID, "pw": ADMIN_PW }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    authorization(&response)
}

async fn error_reason(response: LocalResponse<'_>) -> String {
    let body: AuthErrorResponse = response.into_json().await.expect("error body");
    body.reason
}

#[tokio::test]
async fn login_returns_pair_in_authorization_header() {
    let client = client().await;
    let response = client
        .post("/api/v1/admin/login")
        .json(&json!({ "id": ADMIN_ID, "pw": ADMIN_PW }))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);
    let header = authorization(&response);
    let pair = PresentedPair::parse(&header);
    assert!(!pair.access.is_empty());
    assert!(!pair.refresh.is_empty());
    assert_ne!(pair.access, pair.refresh);

    let body: SessionResponse = response.into_json().await.expect("session body");
    assert_eq!(body.admin_id, ADMIN_ID);
    assert_eq!(body.name, format!("Admin {ADMIN_ID}"));
}

#[tokio::test]
async fn login_rejects_bad_credentials_uniformly() {
    let client = client().await;

    let wrong_pw = client
        .post("/api/v1/admin/login")
        .json(&json!({ "id": ADMIN_ID, "pw": "@@Wrong123456" }))
        .dispatch()
        .await;
    assert_eq!(wrong_pw.status(), Status::Unauthorized);
    assert!(wrong_pw.headers().get_one("Authorization").is_none());
    assert_eq!(error_reason(wrong_pw).await, "invalid_credentials");

    let unknown = client
        .post("/api/v1/admin/login")
        .json(&json!({ "id": "nobody12345", "pw": ADMIN_PW }))
        .dispatch()
        .await;
    assert_eq!(unknown.status(), Status::Unauthorized);
    assert_eq!(error_reason(unknown).await, "invalid_credentials");

    let empty = client
        .post("/api/v1/admin/login")
        .json(&json!({ "id": "", "pw": "" }))
        .dispatch()
        .await;
    assert_eq!(empty.status(), Status::BadRequest);
}

#[tokio::test]
async fn reissue_rotates_access_and_keeps_refresh() {
    let client = client().await;
    let original = login_pair(&client).await;

    let response = client
        .post("/api/v1/admin/auth")
        .header(Header::new("Authorization", original.clone()))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let rotated = authorization(&response);
    let before = PresentedPair::parse(&original);
    let after = PresentedPair::parse(&rotated);
    assert_ne!(before.access, after.access);
    assert_eq!(before.refresh, after.refresh);

    let second = client
        .post("/api/v1/admin/auth")
        .header(Header::new("Authorization", rotated))
        .dispatch()
        .await;
    assert_eq!(second.status(), Status::Ok);
}

#[tokio::test]
async fn replayed_pair_revokes_the_session() {
    let client = client().await;
    let original = login_pair(&client).await;

    let response = client
        .post("/api/v1/admin/auth")
        .header(Header::new("Authorization", original.clone()))
        .dispatch()
        .await;
    let rotated = authorization(&response);

    let replay = client
        .post("/api/v1/admin/auth")
        .header(Header::new("Authorization", original))
        .dispatch()
        .await;
    assert_eq!(replay.status(), Status::Unauthorized);
    assert_eq!(error_reason(replay).await, "token_reuse_detected");

    // The legitimate holder is locked out too.
    let legitimate = client
        .post("/api/v1/admin/auth")
        .header(Header::new("Authorization", rotated.clone()))
        .dispatch()
        .await;
    assert_eq!(legitimate.status(), Status::Unauthorized);
    assert_eq!(error_reason(legitimate).await, "token_reuse_detected");

    let access = PresentedPair::parse(&rotated).access.to_string();
    let lookup = client
        .get("/api/v1/admin/session")
        .header(Header::new("Authorization", access))
        .dispatch()
        .await;
    assert_eq!(lookup.status(), Status::Unauthorized);
    assert_eq!(error_reason(lookup).await, "session_not_found");
}

#[tokio::test]
async fn reissue_requires_refresh_component() {
    let client = client().await;
    let pair = login_pair(&client).await;
    let access = PresentedPair::parse(&pair).access.to_string();

    let response = client
        .post("/api/v1/admin/auth")
        .header(Header::new("Authorization", access))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);
    assert_eq!(error_reason(response).await, "missing_refresh_token");

    let missing = client.post("/api/v1/admin/auth").dispatch().await;
    assert_eq!(missing.status(), Status::Unauthorized);
    assert_eq!(error_reason(missing).await, "missing_refresh_token");
}

#[tokio::test]
async fn unreadable_refresh_is_invalid_and_spares_the_session() {
    let client = client().await;
    let pair = login_pair(&client).await;
    let access = PresentedPair::parse(&pair).access.to_string();

    let response = client
        .post("/api/v1/admin/auth")
        .header(Header::new("Authorization", format!("{access} not.a.token")))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);
    assert_eq!(error_reason(response).await, "refresh_invalid");

    // Nothing in the token names a session, so the real one survives.
    let reissued = client
        .post("/api/v1/admin/auth")
        .header(Header::new("Authorization", pair))
        .dispatch()
        .await;
    assert_eq!(reissued.status(), Status::Ok);
}

#[tokio::test]
async fn forged_refresh_revokes_the_named_session() {
    let client = client().await;
    let pair = login_pair(&client).await;
    let presented = PresentedPair::parse(&pair);
    let codec = TokenCodec::new("board-test");
    let named = codec
        .peek_claims(presented.refresh)
        .expect("refresh claims readable");

    let forged = codec
        .issue(
            &ClaimSet {
                session_id: named.sid,
                identity_id: ADMIN_ID.into(),
                display_name: named.name.clone(),
                authorized: None,
            },
            &SigningSecret::new(b"guessed-secret"),
            Duration::days(1),
        )
        .expect("forge token");

    let response = client
        .post("/api/v1/admin/auth")
        .header(Header::new(
            "Authorization",
            format!("{} {}", presented.access, forged.token),
        ))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);
    assert_eq!(error_reason(response).await, "refresh_invalid");

    let reissued = client
        .post("/api/v1/admin/auth")
        .header(Header::new("Authorization", pair.clone()))
        .dispatch()
        .await;
    assert_eq!(reissued.status(), Status::Unauthorized);
    assert_eq!(error_reason(reissued).await, "token_reuse_detected");

    let lookup = client
        .get("/api/v1/admin/session")
        .header(Header::new("Authorization", pair))
        .dispatch()
        .await;
    assert_eq!(lookup.status(), Status::Unauthorized);
    assert_eq!(error_reason(lookup).await, "session_not_found");
}

#[tokio::test]
async fn session_lookup_describes_live_session() {
    let client = client().await;
    let pair = login_pair(&client).await;

    let response = client
        .get("/api/v1/admin/session")
        .header(Header::new("Authorization", pair))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let body: SessionResponse = response.into_json().await.expect("session body");
    assert_eq!(body.admin_id, ADMIN_ID);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let client = client().await;
    let pair = login_pair(&client).await;

    let response = client
        .post("/api/v1/admin/logout")
        .header(Header::new("Authorization", pair.clone()))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NoContent);

    let lookup = client
        .get("/api/v1/admin/session")
        .header(Header::new("Authorization", pair.clone()))
        .dispatch()
        .await;
    assert_eq!(lookup.status(), Status::Unauthorized);
    assert_eq!(error_reason(lookup).await, "session_not_found");

    let reissue = client
        .post("/api/v1/admin/auth")
        .header(Header::new("Authorization", pair))
        .dispatch()
        .await;
    assert_eq!(reissue.status(), Status::Unauthorized);
    assert_eq!(error_reason(reissue).await, "token_reuse_detected");
}

#[tokio::test]
async fn logout_without_tokens_is_rejected() {
    let client = client().await;
    let response = client.post("/api/v1/admin/logout").dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);
    assert_eq!(error_reason(response).await, "missing_access_token");
}
