use super::error::AuthError;
use super::models::{AccessProfile, Principal, StaffProfile};
use super::session::{format_utc_time, Session, SessionToken};
use crate::access::GateTracker;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sled::Db;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

const SESSION_TREE_PREFIX: &str = "session:";

// Fixed keys inside each session namespace
const KEY_USER: &str = "user";
const KEY_STAFF: &str = "staff";
const KEY_TOKEN: &str = "token";
const KEY_ACCESS: &str = "access";
const KEY_META: &str = "meta";

/// Durable key-value persistence of session fields
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Write every field of the session under its fixed key
    async fn save(&self, session: &Session) -> Result<(), AuthError>;

    /// Read back every persisted session
    async fn load_all(&self) -> Result<Vec<Session>, AuthError>;

    /// Remove all keys of a session
    async fn clear(&self, token: &SessionToken) -> Result<(), AuthError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionMeta {
    created_at: u64,
    expires_at: u64,
    last_accessed: u64,
    client_ip: Option<String>,
}

/// sled-backed storage: one tree per session, fields under fixed keys
#[derive(Clone)]
pub struct SledSessionStorage {
    db: Db,
}

impl SledSessionStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, AuthError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    fn tree_name(token: &str) -> String {
        format!("{SESSION_TREE_PREFIX}{token}")
    }

    fn read_tree(&self, token: &str, tree: &sled::Tree) -> Result<Option<Session>, AuthError> {
        let (Some(user), Some(bearer), Some(access), Some(meta)) = (
            tree.get(KEY_USER)?,
            tree.get(KEY_TOKEN)?,
            tree.get(KEY_ACCESS)?,
            tree.get(KEY_META)?,
        ) else {
            return Ok(None);
        };

        let principal: Principal = serde_json::from_slice(&user)?;
        let staff: Option<StaffProfile> = match tree.get(KEY_STAFF)? {
            Some(raw) => serde_json::from_slice(&raw)?,
            None => None,
        };
        let access: AccessProfile = serde_json::from_slice(&access)?;
        let meta: SessionMeta = serde_json::from_slice(&meta)?;
        let bearer_token = String::from_utf8(bearer.to_vec())
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;

        Ok(Some(Session {
            token: token.to_string(),
            principal,
            staff,
            bearer_token,
            access,
            created_at: meta.created_at,
            created_at_utc: format_utc_time(meta.created_at),
            expires_at: meta.expires_at,
            last_accessed: meta.last_accessed,
            last_accessed_utc: format_utc_time(meta.last_accessed),
            client_ip: meta.client_ip,
            gate: GateTracker::default(),
        }))
    }
}

#[async_trait]
impl SessionStorage for SledSessionStorage {
    async fn save(&self, session: &Session) -> Result<(), AuthError> {
        let tree = self.db.open_tree(Self::tree_name(&session.token))?;

        let meta = SessionMeta {
            created_at: session.created_at,
            expires_at: session.expires_at,
            last_accessed: session.last_accessed,
            client_ip: session.client_ip.clone(),
        };

        tree.insert(KEY_USER, serde_json::to_vec(&session.principal)?)?;
        tree.insert(KEY_STAFF, serde_json::to_vec(&session.staff)?)?;
        tree.insert(KEY_TOKEN, session.bearer_token.as_bytes())?;
        tree.insert(KEY_ACCESS, serde_json::to_vec(&session.access)?)?;
        tree.insert(KEY_META, serde_json::to_vec(&meta)?)?;

        self.db.flush()?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Session>, AuthError> {
        let mut sessions = Vec::new();

        for name in self.db.tree_names() {
            let Some(token) = std::str::from_utf8(&name)
                .ok()
                .and_then(|n| n.strip_prefix(SESSION_TREE_PREFIX))
            else {
                continue;
            };

            let tree = self.db.open_tree(&name)?;
            match self.read_tree(token, &tree) {
                Ok(Some(session)) => sessions.push(session),
                // Half-written namespace, nothing to restore
                Ok(None) => {
                    self.db.drop_tree(&name)?;
                }
                Err(AuthError::SerializationError(e)) => {
                    warn!("Dropping unreadable stored session: {}", e);
                    self.db.drop_tree(&name)?;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(sessions)
    }

    async fn clear(&self, token: &SessionToken) -> Result<(), AuthError> {
        self.db.drop_tree(Self::tree_name(token))?;
        self.db.flush()?;
        Ok(())
    }
}

/// In-process storage for tests and ephemeral deployments
#[derive(Default)]
pub struct MemorySessionStorage {
    sessions: RwLock<HashMap<SessionToken, Session>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn save(&self, session: &Session) -> Result<(), AuthError> {
        self.sessions
            .write()
            .insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Session>, AuthError> {
        Ok(self.sessions.read().values().cloned().collect())
    }

    async fn clear(&self, token: &SessionToken) -> Result<(), AuthError> {
        self.sessions.write().remove(token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::tests::seed;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sled_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SledSessionStorage::new(temp_dir.path().join("sessions.sled")).unwrap();

        let session = Session::new("tok1".to_string(), seed("u1", &["manage-cms"]), 60_000, None);
        storage.save(&session).await.unwrap();

        let loaded = storage.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].token, "tok1");
        assert_eq!(loaded[0].principal, session.principal);
        assert_eq!(loaded[0].staff, session.staff);
        assert_eq!(loaded[0].bearer_token, "bearer-u1");
        assert_eq!(loaded[0].access, session.access);
        assert_eq!(loaded[0].expires_at, session.expires_at);
    }

    #[tokio::test]
    async fn test_sled_fixed_keys() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SledSessionStorage::new(temp_dir.path().join("sessions.sled")).unwrap();

        let session = Session::new("tok1".to_string(), seed("u1", &[]), 60_000, None);
        storage.save(&session).await.unwrap();

        let tree = storage.db.open_tree("session:tok1").unwrap();
        assert!(tree.contains_key(KEY_USER).unwrap());
        assert!(tree.contains_key(KEY_STAFF).unwrap());
        assert_eq!(tree.get(KEY_TOKEN).unwrap().unwrap().to_vec(), b"bearer-u1".to_vec());
    }

    #[tokio::test]
    async fn test_sled_skips_unreadable_entry() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SledSessionStorage::new(temp_dir.path().join("sessions.sled")).unwrap();

        let good = Session::new("tok1".to_string(), seed("u1", &[]), 60_000, None);
        let bad = Session::new("tok2".to_string(), seed("u2", &[]), 60_000, None);
        storage.save(&good).await.unwrap();
        storage.save(&bad).await.unwrap();

        let tree = storage.db.open_tree("session:tok2").unwrap();
        tree.insert(KEY_USER, &b"{not json"[..]).unwrap();

        let loaded = storage.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].token, "tok1");

        let names = storage.db.tree_names();
        assert!(!names.iter().any(|n| &n[..] == b"session:tok2"));
    }

    #[tokio::test]
    async fn test_sled_clear() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SledSessionStorage::new(temp_dir.path().join("sessions.sled")).unwrap();

        let session = Session::new("tok1".to_string(), seed("u1", &[]), 60_000, None);
        storage.save(&session).await.unwrap();
        storage.clear(&"tok1".to_string()).await.unwrap();

        assert!(storage.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemorySessionStorage::new();
        let session = Session::new("tok1".to_string(), seed("u1", &[]), 60_000, None);

        storage.save(&session).await.unwrap();
        assert_eq!(storage.load_all().await.unwrap().len(), 1);

        storage.clear(&session.token).await.unwrap();
        assert!(storage.load_all().await.unwrap().is_empty());
    }
}
