// Public API
pub mod error;
pub mod models;
pub mod moka_session_repository;
pub mod session;
pub mod session_store;
pub mod storage;

// Re-export commonly used types
pub use error::AuthError;
pub use models::{
    AccessProfile, Credentials, PermissionSet, Principal, Role, SignInGrant, StaffProfile,
    UserUpdate,
};
pub use moka_session_repository::MokaSessionRepository;
pub use session::{
    current_timestamp_ms, format_utc_time, generate_session_token, Session, SessionSeed,
    SessionToken,
};
pub use session_store::{SessionEdit, SessionRepository, SessionStore};
pub use storage::{MemorySessionStorage, SessionStorage, SledSessionStorage};
