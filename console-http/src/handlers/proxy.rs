use crate::error::ApiError;
use crate::middleware::CurrentSession;
use crate::state::AppState;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::Response,
};
use tracing::warn;

const API_PREFIX: &str = "/api";

/// ANY /api/{*path}
///
/// Relays the request to the lab backend with the session's bearer token
/// and returns the backend's status, content type and body untouched.
/// A backend 401 means the bearer token is dead, so the console session
/// is closed as well.
pub async fn forward(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let path = uri.path().strip_prefix(API_PREFIX).unwrap_or(uri.path());
    let target = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|h| h.to_str().ok());

    let forwarded = state
        .api_client
        .forward(method, &target, content_type, body.to_vec(), Some(&session.bearer_token))
        .await?;

    if forwarded.status == StatusCode::UNAUTHORIZED.as_u16() {
        warn!(
            "Backend rejected bearer token for principal={}, closing session",
            session.principal.id
        );
        if let Err(e) = state.session_store.logout(&session.token).await {
            warn!("Failed to close session: {}", e);
        }
    }

    let status = StatusCode::from_u16(forwarded.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);
    if let Some(content_type) = forwarded.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }

    builder
        .body(Body::from(forwarded.body))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
