use super::authentication::CurrentSession;
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use labdesk::access::{AccessGate, GateDecision, ACCESS_DENIED};
use tracing::{debug, warn};

/// Runs the session's gate tracker for the requested page.
///
/// Must sit behind `require_page_session`. A forbidden path is replaced
/// with the first permitted landing route (303); a session with nothing
/// permitted goes to the access-denied page.
pub async fn access_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(CurrentSession(mut session)) = request.extensions_mut().remove::<CurrentSession>() else {
        return ApiError::Unauthorized("Authentication required".into()).into_response();
    };

    let path = request.uri().path().to_string();
    let gate = AccessGate::new(state.catalog);
    let decision = session.gate.observe(&gate, &path, &session.access);

    if let Err(e) = state.session_store.touch(&session).await {
        warn!("Failed to record gate state: {}", e);
    }

    match decision {
        GateDecision::Allow => {
            request.extensions_mut().insert(CurrentSession(session));
            next.run(request).await
        }
        GateDecision::RedirectTo(target) => {
            debug!(
                "GATE: principal={}, path={}, redirect={}",
                session.principal.id, path, target
            );
            Redirect::to(&target).into_response()
        }
        GateDecision::AccessDenied => {
            warn!(
                "GATE: principal={} has no permitted pages, denied {}",
                session.principal.id, path
            );
            Redirect::to(ACCESS_DENIED).into_response()
        }
    }
}
