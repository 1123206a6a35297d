use axum::{extract::Request, ServiceExt};
use console_http::{build_router, AppState};
use labdesk::access::default_catalog;
use labdesk::auth::{MemorySessionStorage, MokaSessionRepository, SessionStorage, SessionStore, SledSessionStorage};
use labdesk::backend::ApiClient;
use shared::config::Config;
use shared::TtlMs;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Labdesk console...");

    // Load environment variables from .env file (if exists)
    match dotenvy::dotenv() {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let config = Config::from_env();

    let api_client = match ApiClient::new(&config.backend_url, Duration::from_secs(config.backend_timeout_secs)) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to build backend client: {}", e);
            std::process::exit(1);
        }
    };
    info!("Backend: {}", api_client.base_url());

    info!("Initializing session store...");
    let session_store = Arc::new(init_session_store(&config).await);

    let state = AppState::new(session_store, api_client.clone(), api_client, default_catalog())
        .with_secure_cookies(config.cookie_secure);

    // Build the normalized app
    let app = build_router(state, &config);

    // Start server
    let address = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", address, e);
            std::process::exit(1);
        }
    };

    info!("Console listening on http://{}", address);

    // Graceful shutdown handler
    if let Err(e) = axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }

    info!("Server shutdown complete");
}

async fn init_session_store(config: &Config) -> SessionStore<MokaSessionRepository> {
    let ttl = TtlMs::from_secs(config.session_ttl_secs);
    let repository = Arc::new(MokaSessionRepository::new(
        config.max_sessions,
        Some(Duration::from_secs(config.session_ttl_secs)),
    ));

    let storage_path = std::path::Path::new(&config.data_dir).join(".labdesk");

    // Create .labdesk directory if it doesn't exist
    if let Err(e) = std::fs::create_dir_all(&storage_path) {
        warn!("Failed to create .labdesk directory: {}", e);
    }

    // Try to persist sessions on disk, fall back to in-memory if it fails
    let storage: Arc<dyn SessionStorage> = match SledSessionStorage::new(storage_path.join("sessions.sled")) {
        Ok(storage) => {
            info!("Session persistence enabled at {}", storage_path.display());
            Arc::new(storage)
        }
        Err(e) => {
            warn!("Failed to open session storage: {}. Sessions will not survive a restart.", e);
            Arc::new(MemorySessionStorage::new())
        }
    };

    let store = SessionStore::new(repository, storage, ttl)
        .with_legacy_owner_inference(config.legacy_owner_inference);

    if let Err(e) = store.rehydrate().await {
        warn!("Failed to rehydrate sessions: {}", e);
    }

    store
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
