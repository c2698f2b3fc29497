//! Shared-secret check for the push endpoint

use std::collections::HashMap;

use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::routes::AppState;

/// Query parameter carrying the shared secret
pub const SECRET_PARAM: &str = "x-api-secret";

/// Reject requests whose `x-api-secret` query parameter does not match
///
/// Passes everything through when no secret is configured.
pub async fn require_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.secret.as_deref() else {
        return next.run(request).await;
    };

    let provided = Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(mut params)| params.remove(SECRET_PARAM));

    if provided.as_deref() == Some(expected) {
        return next.run(request).await;
    }

    tracing::debug!(path = %request.uri().path(), "Rejected push with bad secret");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "Unauthorized" })),
    )
        .into_response()
}
