use super::state::AppState;
use crate::channel::{MethodCall, MethodResponse};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::warn;

/// POST /channel/invoke
///
/// Always answers 200; failures are carried in the `MethodResponse` body so
/// the caller sees one response shape regardless of outcome.
pub async fn invoke(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let response = match MethodCall::from_json(&body) {
        Ok(call) => state.channel.handle(call).await,
        Err(e) => {
            warn!("Malformed call: {}", e);
            MethodResponse::from(e)
        }
    };

    (StatusCode::OK, Json(response))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
