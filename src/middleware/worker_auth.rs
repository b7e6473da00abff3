use crate::common::response::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::warn;

/// Header carrying the shared static worker credential, on both the outbound
/// `/execute` call and the inbound status callback.
pub const WORKER_API_KEY_HEADER: &str = "x-worker-api-key";

/// Guards worker-facing routes. Workers are not users: they authenticate with
/// a shared static key, not a bearer token. When no key is configured the
/// check is skipped entirely; `AppConfig` only permits that in development.
pub async fn worker_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = state.config.worker_api_key.as_deref() {
        let presented = req
            .headers()
            .get(WORKER_API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if presented != expected {
            warn!("worker callback rejected: missing or mismatched API key");
            return Err(ApiError(
                "Unauthorized".to_string(),
                StatusCode::UNAUTHORIZED,
            ));
        }
    }

    Ok(next.run(req).await)
}
