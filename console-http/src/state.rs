use labdesk::access::Catalog;
use labdesk::auth::{MokaSessionRepository, SessionStore};
use labdesk::backend::{ApiClient, AuthBackend};
use std::sync::Arc;

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub session_store: Arc<SessionStore<MokaSessionRepository>>,
    /// Sign-in and password reset; the `ApiClient` in production
    pub auth_backend: Arc<dyn AuthBackend>,
    /// Raw forwarding for the `/api` data proxy
    pub api_client: Arc<ApiClient>,
    pub catalog: &'static Catalog,
    pub cookie_secure: bool,
}

impl AppState {
    pub fn new(
        session_store: Arc<SessionStore<MokaSessionRepository>>,
        auth_backend: Arc<dyn AuthBackend>,
        api_client: Arc<ApiClient>,
        catalog: &'static Catalog,
    ) -> Self {
        Self {
            session_store,
            auth_backend,
            api_client,
            catalog,
            cookie_secure: false,
        }
    }

    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }
}
