//! Waitlist HTTP API
//!
//! ## Endpoints
//!
//! - `POST /api/early-access` - Submit a signup
//! - `GET /api/early-access` - List signups, newest first (admin)
//! - `GET /api/early-access/count` - Number of signups (admin)
//! - `GET /api/early-access/lookup?email=` - Whether an address is registered (admin)
//! - `GET /health` - Liveness

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::waitlist::{
    config::ServerConfig,
    error::WaitlistError,
    model::{EarlyAccessSignup, SignupRequest},
    service::Waitlist,
    validate::ValidationErrors,
};

#[derive(Clone)]
pub struct WaitlistState {
    pub waitlist: Waitlist,
    pub admin_token: Option<Arc<str>>,
    pub expose_duplicates: bool,
}

impl WaitlistState {
    pub fn new(waitlist: Waitlist, config: &ServerConfig) -> Self {
        Self {
            waitlist,
            admin_token: config.admin_token.as_deref().map(Arc::from),
            expose_duplicates: config.expose_duplicates,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_registered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct ValidationResponse<'a> {
    success: bool,
    errors: &'a ValidationErrors,
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    #[serde(default)]
    pub email: String,
}

/// Errors leaving a handler.
pub enum ApiError {
    Unauthorized,
    /// The body was not a JSON signup form.
    Body(JsonRejection),
    Waitlist(WaitlistError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection)
    }
}

impl From<WaitlistError> for ApiError {
    fn from(e: WaitlistError) -> Self {
        ApiError::Waitlist(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "success": false, "error": "unauthorized" })),
            )
                .into_response(),
            ApiError::Body(rejection) => {
                let mut errors = ValidationErrors::default();
                errors.add("body", rejection.body_text());
                (
                    rejection.status(),
                    Json(ValidationResponse {
                        success: false,
                        errors: &errors,
                    }),
                )
                    .into_response()
            }
            ApiError::Waitlist(WaitlistError::Validation(errors)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ValidationResponse {
                    success: false,
                    errors: &errors,
                }),
            )
                .into_response(),
            ApiError::Waitlist(WaitlistError::Store(e)) => {
                log::error!("Waitlist store failure: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

/// Create the waitlist router.
pub fn waitlist_routes(state: WaitlistState) -> Router {
    Router::new()
        .route("/api/early-access", get(list_signups).post(submit_signup))
        .route("/api/early-access/count", get(count_signups))
        .route("/api/early-access/lookup", get(lookup_signup))
        .route("/health", get(health))
        .with_state(state)
}

/// CORS for the landing page origin, or any origin when none is configured.
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    match config
        .allowed_origin
        .as_deref()
        .and_then(|origin| HeaderValue::from_str(origin).ok())
    {
        Some(origin) => layer.allow_origin(origin),
        None => layer.allow_origin(Any),
    }
}

fn authorize(state: &WaitlistState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Ok(());
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match presented {
        Some(token) if tokens_match(token.as_bytes(), expected.as_bytes()) => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

/// Constant-time comparison: every byte of `expected` is visited whatever the
/// position of the first mismatch.
fn tokens_match(presented: &[u8], expected: &[u8]) -> bool {
    let mut diff = u8::from(presented.len() != expected.len());
    for (i, byte) in expected.iter().enumerate() {
        diff |= byte ^ presented.get(i).copied().unwrap_or(!byte);
    }
    diff == 0
}

/// POST /api/early-access
async fn submit_signup(
    State(state): State<WaitlistState>,
    request: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(request) = request?;
    let outcome = state.waitlist.submit(&request).await?;
    let response = if state.expose_duplicates {
        SubmitResponse {
            success: true,
            already_registered: Some(outcome.is_duplicate()),
            id: outcome.id(),
        }
    } else {
        SubmitResponse {
            success: true,
            already_registered: None,
            id: None,
        }
    };
    Ok(Json(response))
}

/// GET /api/early-access
async fn list_signups(
    State(state): State<WaitlistState>,
    headers: HeaderMap,
) -> Result<Json<Vec<EarlyAccessSignup>>, ApiError> {
    authorize(&state, &headers)?;
    Ok(Json(state.waitlist.list().await?))
}

/// GET /api/early-access/count
async fn count_signups(
    State(state): State<WaitlistState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let count = state.waitlist.count().await?;
    Ok(Json(json!({ "count": count })))
}

/// GET /api/early-access/lookup?email=
async fn lookup_signup(
    State(state): State<WaitlistState>,
    headers: HeaderMap,
    Query(query): Query<LookupQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let registered = state.waitlist.lookup(&query.email).await?;
    Ok(Json(json!({ "registered": registered })))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
