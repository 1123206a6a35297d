use super::error::AuthError;
use super::models::{AccessProfile, Role, SignInGrant, StaffProfile, UserUpdate};
use super::session::{Session, SessionSeed, SessionToken};
use super::storage::SessionStorage;
use crate::access::GateTracker;
use async_trait::async_trait;
use shared::{Result, TtlMs};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// In-place edit of a cached session
pub type SessionEdit = Box<dyn FnOnce(&mut Session) + Send>;

/// Trait for session storage operations
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a new session from the seed with specified TTL and optional client IP
    async fn create_session(&self, seed: SessionSeed, ttl_ms: u64, client_ip: Option<String>) -> Result<Session>;

    /// Put back a session that already has a token (rehydration)
    async fn restore_session(&self, session: Session) -> Result<()>;

    /// Get a session by token, refreshing its last_accessed timestamp
    async fn get_session(&self, token: &SessionToken) -> Result<Session>;

    /// Delete a session, returning it if it existed
    async fn delete_session(&self, token: &SessionToken) -> Result<Option<Session>>;

    /// Check if a live session exists
    async fn session_exists(&self, token: &SessionToken) -> Result<bool>;

    /// Get all live sessions of a principal
    async fn get_principal_sessions(&self, principal_id: &str) -> Result<Vec<Session>>;

    /// Delete all sessions of a principal
    async fn delete_principal_sessions(&self, principal_id: &str) -> Result<Vec<SessionToken>>;

    /// Apply `edit` to the currently cached session, if there still is one.
    /// Returns the edited session, or `None` when the token is gone.
    async fn modify_session(&self, token: &SessionToken, edit: SessionEdit) -> Result<Option<Session>>;
}

/// Session context: the only writer of session state.
///
/// Every mutation goes to the in-memory repository first and is then
/// written through to durable storage so a restart can rehydrate.
pub struct SessionStore<S: SessionRepository> {
    repository: Arc<S>,
    storage: Arc<dyn SessionStorage>,
    ttl: TtlMs,
    legacy_owner_inference: bool,
}

impl<S: SessionRepository> SessionStore<S> {
    pub fn new(repository: Arc<S>, storage: Arc<dyn SessionStorage>, ttl: TtlMs) -> Self {
        Self {
            repository,
            storage,
            ttl,
            legacy_owner_inference: true,
        }
    }

    pub fn with_legacy_owner_inference(mut self, enabled: bool) -> Self {
        self.legacy_owner_inference = enabled;
        self
    }

    pub fn ttl(&self) -> TtlMs {
        self.ttl
    }

    /// Open a session for a successful backend sign-in
    pub async fn login(&self, grant: SignInGrant, client_ip: Option<String>) -> std::result::Result<Session, AuthError> {
        let access = AccessProfile::resolve(grant.role, grant.staff.as_ref(), self.legacy_owner_inference);
        let seed = SessionSeed {
            principal: grant.principal,
            staff: grant.staff,
            bearer_token: grant.bearer_token,
            access,
        };

        let session = self.repository.create_session(seed, self.ttl.0, client_ip).await?;
        self.storage.save(&session).await?;

        info!(
            "LOGIN: principal={}, role={}, permissions={}",
            session.principal.id,
            session.access.role,
            session.access.permissions.len()
        );

        Ok(session)
    }

    /// Resolve a token to its live session
    pub async fn session(&self, token: &SessionToken) -> std::result::Result<Session, AuthError> {
        Ok(self.repository.get_session(token).await?)
    }

    /// Close a session. Returns false when the token was unknown.
    pub async fn logout(&self, token: &SessionToken) -> std::result::Result<bool, AuthError> {
        let removed = self.repository.delete_session(token).await?;
        self.storage.clear(token).await?;

        if let Some(session) = &removed {
            info!("LOGOUT: principal={}", session.principal.id);
        }

        Ok(removed.is_some())
    }

    /// Close every session of a principal
    pub async fn logout_everywhere(&self, principal_id: &str) -> std::result::Result<usize, AuthError> {
        let tokens = self.repository.delete_principal_sessions(principal_id).await?;
        for token in &tokens {
            self.storage.clear(token).await?;
        }

        info!("LOGOUT_ALL: principal={}, sessions={}", principal_id, tokens.len());
        Ok(tokens.len())
    }

    /// Apply a profile update to the signed-in user.
    ///
    /// Only the principal's own fields change; role and permissions stay
    /// as the backend granted them.
    pub async fn update_user(&self, token: &SessionToken, update: UserUpdate) -> std::result::Result<Session, AuthError> {
        self.repository.get_session(token).await?;

        let session = self
            .repository
            .modify_session(token, Box::new(move |session: &mut Session| update.apply_to(&mut session.principal)))
            .await?
            .ok_or(AuthError::SessionNotFound)?;
        self.persist(&session).await?;

        info!("UPDATE_USER: principal={}", session.principal.id);
        Ok(session)
    }

    /// Replace the session's staff record and access profile with a fresh
    /// read from the backend.
    pub async fn refresh_access(
        &self,
        token: &SessionToken,
        staff: Option<StaffProfile>,
        role: Option<Role>,
    ) -> std::result::Result<Session, AuthError> {
        self.repository.get_session(token).await?;

        let legacy = self.legacy_owner_inference;
        let session = self
            .repository
            .modify_session(
                token,
                Box::new(move |session: &mut Session| {
                    session.access = session.access.refreshed(role, staff.as_ref(), legacy);
                    session.staff = staff;
                }),
            )
            .await?
            .ok_or(AuthError::SessionNotFound)?;
        self.persist(&session).await?;

        info!(
            "REFRESH_ACCESS: principal={}, role={}, permissions={}",
            session.principal.id,
            session.access.role,
            session.access.permissions.len()
        );
        Ok(session)
    }

    /// Write an edited session through to storage. A logout that raced
    /// the edit wins: the stored copy is cleared again.
    async fn persist(&self, session: &Session) -> std::result::Result<(), AuthError> {
        self.storage.save(session).await?;
        if !self.repository.session_exists(&session.token).await? {
            self.storage.clear(&session.token).await?;
        }
        Ok(())
    }

    /// Merge a request's gate bookkeeping into the cached session.
    ///
    /// Only the gate tracker and the access time are written, and nothing
    /// is written once the session has been closed.
    pub async fn touch(&self, session: &Session) -> std::result::Result<(), AuthError> {
        let gate: GateTracker = session.gate.clone();
        let last_accessed = session.last_accessed;
        let last_accessed_utc = session.last_accessed_utc.clone();

        let merged = self
            .repository
            .modify_session(
                &session.token,
                Box::new(move |current: &mut Session| {
                    current.gate = gate;
                    if last_accessed > current.last_accessed {
                        current.last_accessed = last_accessed;
                        current.last_accessed_utc = last_accessed_utc;
                    }
                }),
            )
            .await?;

        if merged.is_none() {
            debug!("touch skipped for a closed session");
        }
        Ok(())
    }

    /// Get all live sessions of a principal
    pub async fn sessions_for(&self, principal_id: &str) -> std::result::Result<Vec<Session>, AuthError> {
        Ok(self.repository.get_principal_sessions(principal_id).await?)
    }

    /// Load persisted sessions into the repository at process start.
    /// Expired sessions are purged from storage instead.
    pub async fn rehydrate(&self) -> std::result::Result<usize, AuthError> {
        let mut restored = 0;

        for session in self.storage.load_all().await? {
            if session.is_expired() {
                self.storage.clear(&session.token).await?;
                continue;
            }

            match self.repository.restore_session(session).await {
                Ok(()) => restored += 1,
                Err(e) => warn!("Failed to restore session: {}", e),
            }
        }

        info!("Rehydrated {} session(s) from storage", restored);
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{default_catalog, AccessGate};
    use crate::auth::models::{PermissionSet, Principal};
    use crate::auth::moka_session_repository::MokaSessionRepository;
    use crate::auth::storage::{MemorySessionStorage, SledSessionStorage};
    use tempfile::TempDir;

    fn grant(id: &str, permissions: &[&str]) -> SignInGrant {
        SignInGrant {
            principal: Principal {
                id: id.to_string(),
                name: format!("User {id}"),
                email: format!("{id}@lab.example"),
                phone: None,
                avatar: None,
            },
            staff: Some(StaffProfile {
                id: format!("staff-{id}"),
                designation: None,
                permissions: permissions.iter().copied().collect::<PermissionSet>(),
            }),
            bearer_token: format!("bearer-{id}"),
            role: None,
        }
    }

    fn memory_store() -> SessionStore<MokaSessionRepository> {
        SessionStore::new(
            Arc::new(MokaSessionRepository::with_defaults()),
            Arc::new(MemorySessionStorage::new()),
            TtlMs::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn test_login_resolves_role() {
        let store = memory_store();

        let owner = store.login(grant("owner", &[]), None).await.unwrap();
        assert_eq!(owner.access.role, Role::Owner);

        let staff = store.login(grant("s1", &["manage-package"]), None).await.unwrap();
        assert_eq!(staff.access.role, Role::Staff);
        assert!(staff.access.allows("manage-package"));
    }

    #[tokio::test]
    async fn test_login_without_legacy_inference() {
        let store = memory_store().with_legacy_owner_inference(false);

        let session = store.login(grant("s1", &[]), None).await.unwrap();
        assert_eq!(session.access.role, Role::Staff);
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let store = memory_store();
        let session = store.login(grant("s1", &["manage-test"]), None).await.unwrap();

        assert!(store.logout(&session.token).await.unwrap());
        assert!(matches!(
            store.session(&session.token).await,
            Err(AuthError::SessionNotFound)
        ));
        assert!(!store.logout(&session.token).await.unwrap());
    }

    fn staff_record(id: &str, permissions: &[&str]) -> StaffProfile {
        StaffProfile {
            id: format!("staff-{id}"),
            designation: None,
            permissions: permissions.iter().copied().collect(),
        }
    }

    #[tokio::test]
    async fn test_update_user_leaves_access_alone() {
        let store = memory_store();
        let session = store.login(grant("s1", &["manage-test"]), None).await.unwrap();

        let update = UserUpdate {
            name: Some("Renamed".to_string()),
            ..Default::default()
        };
        store.update_user(&session.token, update).await.unwrap();

        let reloaded = store.session(&session.token).await.unwrap();
        assert_eq!(reloaded.principal.name, "Renamed");
        assert_eq!(reloaded.access, session.access);
        assert_eq!(reloaded.staff, session.staff);
    }

    #[tokio::test]
    async fn test_update_user_after_logout_is_not_found() {
        let store = memory_store();
        let session = store.login(grant("s1", &["manage-test"]), None).await.unwrap();
        store.logout(&session.token).await.unwrap();

        let update = UserUpdate {
            name: Some("Ghost".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            store.update_user(&session.token, update).await,
            Err(AuthError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_refresh_access_replaces_permissions() {
        let store = memory_store();
        let session = store.login(grant("s1", &["manage-test"]), None).await.unwrap();

        store
            .refresh_access(&session.token, Some(staff_record("s1", &["manage-package"])), None)
            .await
            .unwrap();

        let reloaded = store.session(&session.token).await.unwrap();
        assert!(reloaded.access.allows("manage-package"));
        assert!(!reloaded.access.allows("manage-test"));
    }

    #[tokio::test]
    async fn test_refresh_access_keeps_explicit_owner() {
        let store = memory_store().with_legacy_owner_inference(false);
        let mut owner = grant("o1", &["manage-test"]);
        owner.role = Some(Role::Owner);
        let session = store.login(owner, None).await.unwrap();
        assert!(session.access.is_owner());

        let refreshed = store
            .refresh_access(&session.token, Some(staff_record("o1", &["manage-test"])), None)
            .await
            .unwrap();
        assert!(refreshed.access.is_owner());

        let update = UserUpdate {
            phone: Some("+91 90000 00000".to_string()),
            ..Default::default()
        };
        let updated = store.update_user(&session.token, update).await.unwrap();
        assert!(updated.access.is_owner());
    }

    #[tokio::test]
    async fn test_stale_touch_after_logout_stays_closed() {
        let storage = Arc::new(MemorySessionStorage::new());
        let store = SessionStore::new(
            Arc::new(MokaSessionRepository::with_defaults()),
            storage.clone(),
            TtlMs::from_secs(3600),
        );
        let session = store.login(grant("s1", &["manage-test"]), None).await.unwrap();
        let stale = store.session(&session.token).await.unwrap();

        store.logout(&session.token).await.unwrap();
        store.touch(&stale).await.unwrap();

        assert!(matches!(
            store.session(&session.token).await,
            Err(AuthError::SessionNotFound)
        ));
        assert!(store.sessions_for("s1").await.unwrap().is_empty());
        assert!(storage.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_touch_keeps_concurrent_updates() {
        let store = memory_store();
        let session = store.login(grant("s1", &["manage-test"]), None).await.unwrap();

        // A request resolved the session before the writes below landed
        let mut stale = store.session(&session.token).await.unwrap();

        store
            .update_user(
                &session.token,
                UserUpdate {
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .refresh_access(&session.token, Some(staff_record("s1", &["manage-package"])), None)
            .await
            .unwrap();

        let gate = AccessGate::new(default_catalog());
        stale.gate.observe(&gate, "/tests", &stale.access);
        store.touch(&stale).await.unwrap();

        let current = store.session(&session.token).await.unwrap();
        assert_eq!(current.principal.name, "Renamed");
        assert!(current.access.allows("manage-package"));
        assert!(!current.access.allows("manage-test"));
        assert_eq!(current.gate.evaluations(), 1);
    }

    #[tokio::test]
    async fn test_logout_everywhere() {
        let store = memory_store();
        store.login(grant("s1", &["manage-test"]), None).await.unwrap();
        store.login(grant("s1", &["manage-test"]), None).await.unwrap();
        let other = store.login(grant("s2", &["manage-test"]), None).await.unwrap();

        assert_eq!(store.logout_everywhere("s1").await.unwrap(), 2);
        assert!(store.sessions_for("s1").await.unwrap().is_empty());
        assert!(store.session(&other.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_rehydrate_from_sled() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sessions.sled");

        let token = {
            let storage = Arc::new(SledSessionStorage::new(&path).unwrap());
            let store = SessionStore::new(
                Arc::new(MokaSessionRepository::with_defaults()),
                storage,
                TtlMs::from_secs(3600),
            );
            store.login(grant("s1", &["manage-package"]), None).await.unwrap().token
        };

        let storage = Arc::new(SledSessionStorage::new(&path).unwrap());
        let store = SessionStore::new(
            Arc::new(MokaSessionRepository::with_defaults()),
            storage,
            TtlMs::from_secs(3600),
        );

        assert_eq!(store.rehydrate().await.unwrap(), 1);
        let session = store.session(&token).await.unwrap();
        assert_eq!(session.principal.id, "s1");
        assert_eq!(session.bearer_token, "bearer-s1");
        assert!(session.access.allows("manage-package"));
    }

    #[tokio::test]
    async fn test_rehydrate_drops_expired() {
        let storage = Arc::new(MemorySessionStorage::new());
        let store = SessionStore::new(
            Arc::new(MokaSessionRepository::with_defaults()),
            storage.clone(),
            TtlMs(0),
        );
        store.login(grant("s1", &[]), None).await.unwrap();

        let fresh = SessionStore::new(
            Arc::new(MokaSessionRepository::with_defaults()),
            storage.clone(),
            TtlMs::from_secs(3600),
        );
        assert_eq!(fresh.rehydrate().await.unwrap(), 0);
        assert!(storage.load_all().await.unwrap().is_empty());
    }
}
