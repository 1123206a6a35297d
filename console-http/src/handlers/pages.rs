use crate::error::ApiError;
use crate::middleware::CurrentSession;
use crate::state::AppState;
use axum::{extract::State, http::Uri, Json};
use labdesk::access::{normalize_path, AccessGate};
use shared_http::api::responses::{NavigationResponse, PageResponse};

/// Any catalog page. Runs after the access gate, so reaching here means
/// the session may see the path; it may still not exist.
pub async fn render_page(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    uri: Uri,
) -> Result<Json<PageResponse>, ApiError> {
    let path = normalize_path(uri.path());
    let (_, title) = state
        .catalog
        .lookup(path)
        .ok_or_else(|| ApiError::NotFound(format!("No page at {}", path)))?;

    let permitted = AccessGate::new(state.catalog).permitted(&session.access);

    Ok(Json(PageResponse {
        route: path.to_string(),
        title: title.to_string(),
        principal: session.principal.clone(),
        role: session.access.role,
        navigation: NavigationResponse::from(&permitted),
    }))
}
