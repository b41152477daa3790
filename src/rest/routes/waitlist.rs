// rest/routes/waitlist.rs — Waitlist REST routes.
//
// Translates the service's failure taxonomy into the wire contract:
//   unparsable body  → 400 {"error": "Invalid request body"}
//   missing email    → 400 {"error": "Email is required"}
//   malformed email  → 400 {"error": "Invalid email format"}
//   duplicate        → 409 {"error": "Email already registered"}
//   storage failure  → 500 {"error": "Internal server error"} (logged, not leaked)

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use crate::waitlist::RegisterError;
use crate::AppContext;

#[derive(Deserialize)]
pub struct JoinRequest {
    /// Kept optional so a missing field reports "required" rather than a
    /// generic deserialization error.
    pub email: Option<String>,
}

pub async fn join(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    body: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    // Keep the wire contract uniformly JSON: an unparsable body gets the
    // same {"error": ...} shape as every other failure, not axum's
    // plain-text rejection.
    let Json(body) = body.map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid request body" })),
        )
    })?;

    let client_info = headers.get(USER_AGENT).and_then(|v| v.to_str().ok());

    match ctx
        .waitlist
        .register(body.email.as_deref(), client_info)
        .await
    {
        Ok(_) => Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Successfully joined the waitlist",
            })),
        )),
        Err(RegisterError::MissingEmail) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Email is required" })),
        )),
        Err(RegisterError::InvalidFormat) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid email format" })),
        )),
        Err(RegisterError::Duplicate) => Err((
            StatusCode::CONFLICT,
            Json(json!({ "error": "Email already registered" })),
        )),
        Err(RegisterError::Store(e)) => {
            error!(err = %e, "waitlist signup failed at the store");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            ))
        }
    }
}

pub async fn list(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match ctx.waitlist.list_all().await {
        Ok(listing) => Ok(Json(json!({
            "total": listing.total,
            "entries": listing.entries,
        }))),
        Err(e) => {
            error!(err = %e, "failed to read waitlist");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            ))
        }
    }
}
