use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::state::SharedState;
use crate::submission::parser;

/// Accept one survey response and fan it out to every configured sink.
/// The caller always gets a response; partial sink failure only shows up
/// as `success: false` when the configured policy says so.
pub async fn submit(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Response> {
    let content_type = headers.get("content-type").and_then(|v| v.to_str().ok());

    let raw = parser::parse_body(content_type, &body).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": e })),
        )
            .into_response()
    })?;

    let outcome = state.appender.append(&raw).await;

    if !outcome.overall_succeeded {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "message": format!("Failed to save response: {}", outcome.error_summary()),
            })),
        )
            .into_response());
    }

    let mut body = json!({ "success": true, "message": "Response saved" });
    if let Some(id) = outcome.assigned_id() {
        body["id"] = json!(id);
    }

    Ok((StatusCode::OK, Json(body)).into_response())
}
