use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use labdesk::access::{ROOT, SIGN_IN};
use labdesk::auth::Session;
use tracing::debug;

/// Name of the cookie carrying the console session token
pub const SESSION_COOKIE: &str = "labdesk_session";

/// The live session of the current request, attached by the
/// authentication middleware.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

impl<S: Send + Sync> FromRequestParts<S> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".into()))
    }
}

/// Extract Bearer token from Authorization header
fn extract_bearer_token(auth_header: &str) -> Option<String> {
    // Authorization: Bearer <token>
    let parts: Vec<&str> = auth_header.split_whitespace().collect();

    if parts.len() != 2 || parts[0] != "Bearer" {
        return None;
    }

    Some(parts[1].to_string())
}

/// Session token from the cookie, falling back to a Bearer header
pub fn session_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(Cookie::value)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(extract_bearer_token)
        })
}

/// Look up the request's session; unknown or expired tokens yield `None`.
pub async fn resolve_session(state: &AppState, jar: &CookieJar, headers: &HeaderMap) -> Option<Session> {
    let token = session_token(jar, headers)?;

    match state.session_store.session(&token).await {
        Ok(session) => Some(session),
        Err(e) => {
            debug!("Session lookup failed: {}", e);
            None
        }
    }
}

fn sign_in_location(path: &str) -> String {
    if path == ROOT {
        SIGN_IN.to_string()
    } else {
        format!("{}?next={}", SIGN_IN, path)
    }
}

/// Session guard for JSON endpoints: 401 when there is no live session
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = resolve_session(&state, &jar, request.headers())
        .await
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".into()))?;

    request.extensions_mut().insert(CurrentSession(session));
    Ok(next.run(request).await)
}

/// Session guard for pages: sends the browser to sign-in, remembering
/// where it was going.
pub async fn require_page_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve_session(&state, &jar, request.headers()).await {
        Some(session) => {
            request.extensions_mut().insert(CurrentSession(session));
            next.run(request).await
        }
        None => {
            let location = sign_in_location(request.uri().path());
            debug!("No session for {}, redirecting to {}", request.uri().path(), location);
            Redirect::to(&location).into_response()
        }
    }
}
