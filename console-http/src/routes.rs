use crate::handlers;
use crate::middleware::{access_gate, require_page_session, require_session};
use crate::state::AppState;
use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{any, get, post, put},
    Router,
};
use shared::config::Config;
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::NormalizePath;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// CORS for the console front end. Credentialed requests need explicit
/// origins, so `*` runs without cookies across origins.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if allowed_origins.is_empty() || allowed_origins.iter().any(|origin| origin == "*") {
        warn!("CORS configured to allow any origin");
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|e| error!("Ignoring invalid CORS origin '{}': {}", origin, e))
                .ok()
        })
        .collect();

    cors.allow_origin(origins).allow_credentials(true)
}

/// The console service: the router behind trailing-slash normalization.
pub type ConsoleApp = NormalizePath<Router>;

/// Build and configure the application.
///
/// Normalization wraps the router instead of being layered on it, because
/// layers run after route matching and `/signin/` would already have
/// fallen through to the page gate.
pub fn build_router(state: AppState, config: &Config) -> ConsoleApp {
    // JSON endpoints that need a session but no page gate
    let session_routes = Router::new()
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/session", get(handlers::current_session))
        .route("/auth/session/user", put(handlers::update_user))
        .route("/auth/session/refresh", post(handlers::refresh_session))
        .route("/navigation", get(handlers::navigation))
        .route("/api/{*path}", any(handlers::forward))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    // Every other path is a console page: session first, then the gate
    let pages = Router::new()
        .fallback(handlers::render_page)
        .layer(from_fn_with_state(state.clone(), access_gate))
        .layer(from_fn_with_state(state.clone(), require_page_session));

    let router = Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Public pages
        .route("/signin", get(handlers::signin_page).post(handlers::login))
        .route(
            "/reset-password",
            get(handlers::reset_password_page).post(handlers::request_password_reset),
        )
        .route("/access-denied", get(handlers::access_denied))
        .merge(session_routes)
        .merge(pages)
        // Middleware
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    NormalizePath::trim_trailing_slash(router)
}
