use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use oor3d::waitlist::{
    Waitlist,
    api::{WaitlistState, waitlist_routes},
    config::ServerConfig,
    store::MemoryStore,
};
use serde_json::{Value, json};
use tower::ServiceExt;

const TOKEN: &str = "s3cret";

fn app(config: ServerConfig) -> Router {
    let waitlist = Waitlist::new(Arc::new(MemoryStore::new()));
    waitlist_routes(WaitlistState::new(waitlist, &config))
}

fn admin_config() -> ServerConfig {
    ServerConfig {
        admin_token: Some(TOKEN.to_string()),
        ..Default::default()
    }
}

fn signup(email: &str) -> Value {
    json!({
        "email": email,
        "imvuName": "PixelQueen",
        "discordTag": "pixelqueen#0420",
        "motivation": "Faster texture swaps",
        "socialLink": "",
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/early-access")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let app = app(ServerConfig::default());

    let (status, body) = send(&app, get("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn submit_hides_duplicates_by_default() {
    let app = app(ServerConfig::default());

    let (status, first) = send(&app, post(&signup("ada@example.com"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, json!({ "success": true }));

    let (status, second) = send(&app, post(&signup("ADA@example.com"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second, first);
}

#[tokio::test]
async fn submit_reports_duplicates_when_exposed() {
    let app = app(ServerConfig {
        expose_duplicates: true,
        ..Default::default()
    });

    let (_, first) = send(&app, post(&signup("ada@example.com"))).await;
    assert_eq!(first["success"], json!(true));
    assert_eq!(first["alreadyRegistered"], json!(false));
    assert!(first["id"].is_string());

    let (_, second) = send(&app, post(&signup("ada@example.com"))).await;
    assert_eq!(second, json!({ "success": true, "alreadyRegistered": true }));
}

#[tokio::test]
async fn invalid_submission_is_422_with_field_errors() {
    let app = app(ServerConfig::default());
    let mut body = signup("foo@bar");
    body["imvuName"] = json!("   ");

    let (status, body) = send(&app, post(&body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["errors"]["email"], json!("Please enter a valid email address"));
    assert_eq!(body["errors"]["imvuName"], json!("IMVU name is required"));
}

#[tokio::test]
async fn admin_routes_require_the_token() {
    let app = app(admin_config());

    for uri in [
        "/api/early-access",
        "/api/early-access/count",
        "/api/early-access/lookup?email=ada@example.com",
    ] {
        let (status, _) = send(&app, get(uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri} without token");
        let (status, _) = send(&app, get(uri, Some("wrong"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri} with a wrong token");
    }
}

#[tokio::test]
async fn admin_routes_are_open_without_a_configured_token() {
    let app = app(ServerConfig::default());

    let (status, body) = send(&app, get("/api/early-access/count", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "count": 0 }));
}

#[tokio::test]
async fn list_count_and_lookup() {
    let app = app(admin_config());
    send(&app, post(&signup("first@example.com"))).await;
    send(&app, post(&signup("second@example.com"))).await;
    send(&app, post(&signup("first@example.com"))).await;

    let (status, list) = send(&app, get("/api/early-access", Some(TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["email"], json!("second@example.com"));
    assert!(list[0]["createdAt"].is_string());
    assert!(list[0].get("socialLink").is_none());

    let (_, count) = send(&app, get("/api/early-access/count", Some(TOKEN))).await;
    assert_eq!(count, json!({ "count": 2 }));

    let (_, found) = send(
        &app,
        get("/api/early-access/lookup?email=FIRST@example.com", Some(TOKEN)),
    )
    .await;
    assert_eq!(found, json!({ "registered": true }));

    let (_, missing) = send(
        &app,
        get("/api/early-access/lookup?email=nobody@example.com", Some(TOKEN)),
    )
    .await;
    assert_eq!(missing, json!({ "registered": false }));
}

#[tokio::test]
async fn near_miss_tokens_are_rejected() {
    let app = app(admin_config());

    for token in ["s3creT", "s3cre", "s3cret!", "", "S3CRET"] {
        let (status, body) = send(&app, get("/api/early-access/count", Some(token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "token {token:?}");
        assert_eq!(body["success"], json!(false));
    }

    let (status, _) = send(&app, get("/api/early-access/count", Some(TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
}

fn post_raw(body: &str, content_type: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/api/early-access");
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn null_fields_are_reported_as_missing() {
    let app = app(ServerConfig::default());
    let body = json!({
        "email": "ada@example.com",
        "imvuName": null,
        "discordTag": "pixelqueen#0420",
        "motivation": "Faster texture swaps",
    });

    let (status, body) = send(&app, post(&body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["errors"]["imvuName"], json!("IMVU name is required"));
}

#[tokio::test]
async fn mistyped_body_keeps_the_error_envelope() {
    let app = app(ServerConfig::default());
    let mut body = signup("ada@example.com");
    body["email"] = json!(5);

    let (status, body) = send(&app, post(&body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], json!(false));
    assert!(body["errors"]["body"].is_string());
}

#[tokio::test]
async fn malformed_json_keeps_the_error_envelope() {
    let app = app(ServerConfig::default());

    let (status, body) = send(&app, post_raw("{", Some("application/json"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert!(body["errors"]["body"].is_string());
}

#[tokio::test]
async fn missing_content_type_keeps_the_error_envelope() {
    let app = app(ServerConfig::default());

    let (status, body) = send(&app, post_raw(&signup("ada@example.com").to_string(), None)).await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["success"], json!(false));
    assert!(body["errors"]["body"].is_string());
}
