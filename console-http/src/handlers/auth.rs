use crate::error::ApiError;
use crate::middleware::authentication::resolve_session;
use crate::middleware::{CurrentSession, SESSION_COOKIE};
use crate::state::AppState;
use crate::validation::{safe_next, validate_credentials, validate_email, ValidationError};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::STANDARD, Engine};
use labdesk::access::{ACCESS_DENIED, RESET_PASSWORD, SIGN_IN};
use labdesk::auth::{AuthError, Credentials};
use shared_http::api::requests::{
    LoginRequest, LogoutQuery, NextQuery, ResetPasswordRequest, UpdateUserRequest,
};
use shared_http::api::responses::{
    LoginResponse, LogoutResponse, MessageResponse, PublicPageResponse, SessionResponse,
};
use tracing::warn;

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Client IP from proxy headers only
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            headers
                .get("X-Real-IP")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string())
        })
}

/// Extract Basic Auth credentials from Authorization header
fn extract_basic_auth(auth_header: &str) -> Option<(String, String)> {
    // Authorization: Basic <base64>
    let parts: Vec<&str> = auth_header.split_whitespace().collect();

    if parts.len() != 2 || parts[0] != "Basic" {
        return None;
    }

    let decoded = STANDARD.decode(parts[1]).ok()?;
    let decoded_str = String::from_utf8(decoded).ok()?;

    // Split email:password
    let mut parts = decoded_str.splitn(2, ':');
    let email = parts.next()?.to_string();
    let password = parts.next()?.to_string();

    Some((email, password))
}

/// GET /signin
///
/// Already signed in: straight on to `next`. Otherwise the sign-in shell.
pub async fn signin_page(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
) -> Response {
    if resolve_session(&state, &jar, &headers).await.is_some() {
        return Redirect::to(&safe_next(query.next.as_deref())).into_response();
    }

    Json(PublicPageResponse {
        route: SIGN_IN.to_string(),
        title: "Sign in".to_string(),
        next: query.next.map(|next| safe_next(Some(&next))),
    })
    .into_response()
}

/// POST /signin
///
/// Accepts either:
/// 1. JSON body: {"email": "owner@lab.example", "password": "...", "next": "/packages"}
/// 2. Basic Auth header: Authorization: Basic base64(email:password)
///
/// Signs in against the backend, opens a console session and sets the
/// session cookie. The token is also returned for non-browser clients.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let (credentials, next) = match body {
        Ok(Json(request)) => {
            let next = request.next.clone();
            (Credentials::from(request), next)
        }
        Err(_) => {
            let auth_header = headers
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .ok_or_else(|| {
                    ApiError::BadRequest(
                        "Missing credentials. Provide either JSON body or Basic Auth header".into(),
                    )
                })?;
            let (email, password) = extract_basic_auth(auth_header)
                .ok_or_else(|| ApiError::BadRequest("Invalid Authorization header format".into()))?;
            (Credentials { email, password }, None)
        }
    };

    validate_credentials(&credentials.email, &credentials.password)?;

    let grant = state.auth_backend.sign_in(&credentials).await.map_err(|e| {
        warn!("Sign-in failed for {}: {}", credentials.email, e);
        ApiError::from(e)
    })?;

    let session = state.session_store.login(grant, client_ip(&headers)).await?;

    let jar = jar.add(session_cookie(session.token.clone(), state.cookie_secure));
    let response = LoginResponse {
        token: session.token,
        expires_in: state.session_store.ttl().as_secs(),
        role: session.access.role,
        principal: session.principal,
        redirect: safe_next(next.as_deref()),
    };

    Ok((jar, Json(response)))
}

/// GET /reset-password
pub async fn reset_password_page() -> Json<PublicPageResponse> {
    Json(PublicPageResponse::new(RESET_PASSWORD, "Reset password"))
}

/// POST /reset-password
///
/// Asks the backend to mail a reset link. The answer does not reveal
/// whether the account exists.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_email(&request.email)?;

    state
        .auth_backend
        .request_password_reset(request.email.trim())
        .await?;

    Ok(Json(MessageResponse::new(
        "If an account exists for this email, a reset link has been sent",
    )))
}

/// GET /access-denied
pub async fn access_denied() -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        Json(PublicPageResponse::new(ACCESS_DENIED, "Access denied")),
    )
}

/// POST /auth/logout
///
/// Closes the current session, or with `?everywhere=true` every session of
/// the signed-in user, and clears the cookie.
pub async fn logout(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<LogoutQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<LogoutResponse>), ApiError> {
    let message = if query.everywhere {
        let closed = state
            .session_store
            .logout_everywhere(&session.principal.id)
            .await?;
        format!("Logged out of {} session(s)", closed)
    } else {
        state.session_store.logout(&session.token).await?;
        "Session logged out successfully".to_string()
    };

    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"));
    Ok((jar, Json(LogoutResponse { message })))
}

/// GET /auth/session
pub async fn current_session(CurrentSession(session): CurrentSession) -> Json<SessionResponse> {
    Json(SessionResponse::from(&session))
}

/// PUT /auth/session/user
///
/// Pushes a profile edit into the session. Only name, email, phone and
/// avatar are taken from the client.
pub async fn update_user(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    if request.is_empty() {
        return Err(ValidationError::EmptyUpdate.into());
    }
    if let Some(email) = &request.email {
        validate_email(email)?;
    }

    let updated = state
        .session_store
        .update_user(&session.token, request.into())
        .await?;

    Ok(Json(SessionResponse::from(&updated)))
}

/// POST /auth/session/refresh
///
/// Re-reads the staff record from the backend with the session's own
/// bearer token, so the next page visit is gated against fresh
/// permissions.
pub async fn refresh_session(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<SessionResponse>, ApiError> {
    let grant = match state.auth_backend.current_user(&session.bearer_token).await {
        Ok(grant) => grant,
        Err(AuthError::InvalidCredentials) => {
            warn!("Backend rejected bearer of principal {}, closing session", session.principal.id);
            state.session_store.logout(&session.token).await?;
            return Err(AuthError::SessionExpired.into());
        }
        Err(e) => return Err(e.into()),
    };

    let refreshed = state
        .session_store
        .refresh_access(&session.token, grant.staff, grant.role)
        .await?;

    Ok(Json(SessionResponse::from(&refreshed)))
}
