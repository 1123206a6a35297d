use crate::middleware::CurrentSession;
use crate::state::AppState;
use axum::{extract::State, Json};
use labdesk::access::AccessGate;
use shared_http::api::responses::NavigationResponse;

/// GET /navigation
///
/// The sidebar for the current session: permitted items in catalog order
/// plus the flattened allow-list.
pub async fn navigation(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Json<NavigationResponse> {
    let permitted = AccessGate::new(state.catalog).permitted(&session.access);
    Json(NavigationResponse::from(&permitted))
}
