use super::session::{generate_session_token, Session, SessionSeed, SessionToken};
use super::session_store::{SessionEdit, SessionRepository};
use async_trait::async_trait;
use moka::future::Cache;
use moka::ops::compute::Op;
use parking_lot::RwLock;
use shared::Result;
use std::sync::Arc;
use std::time::Duration;

/// Principal id type alias
pub type PrincipalId = String;

/// Moka-based in-memory session repository with dual-index support
pub struct MokaSessionRepository {
    // Primary index: token -> session
    sessions: Cache<SessionToken, Session>,
    // Secondary index: principal id -> list of session tokens
    principal_sessions: Cache<PrincipalId, Arc<RwLock<Vec<SessionToken>>>>,
}

impl MokaSessionRepository {
    /// Create a new Moka session repository with specified capacity and default TTL
    pub fn new(max_sessions: Option<u64>, default_ttl: Option<Duration>) -> Self {
        let mut sessions_builder = Cache::builder();
        let mut principal_sessions_builder = Cache::builder();

        if let Some(capacity) = max_sessions {
            sessions_builder = sessions_builder.max_capacity(capacity);
            principal_sessions_builder = principal_sessions_builder.max_capacity(capacity);
        }

        if let Some(ttl) = default_ttl {
            sessions_builder = sessions_builder.time_to_live(ttl);
            principal_sessions_builder = principal_sessions_builder.time_to_live(ttl);
        }

        Self {
            sessions: sessions_builder.build(),
            principal_sessions: principal_sessions_builder.build(),
        }
    }

    /// Create with default settings (unbounded, 1 hour TTL)
    pub fn with_defaults() -> Self {
        Self::new(None, Some(Duration::from_secs(3600)))
    }

    async fn index_token(&self, principal_id: &str, token: &SessionToken) {
        let tokens_lock = self
            .principal_sessions
            .get(principal_id)
            .await
            .unwrap_or_else(|| Arc::new(RwLock::new(Vec::new())));

        {
            let mut tokens = tokens_lock.write();
            if !tokens.contains(token) {
                tokens.push(token.clone());
            }
        }

        self.principal_sessions
            .insert(principal_id.to_string(), tokens_lock)
            .await;
    }

    /// Snapshot a principal's token list so the lock is released before awaiting
    async fn principal_tokens(&self, principal_id: &str) -> Option<(Arc<RwLock<Vec<SessionToken>>>, Vec<SessionToken>)> {
        let tokens_lock = self.principal_sessions.get(principal_id).await?;
        let token_list = tokens_lock.read().clone();
        Some((tokens_lock, token_list))
    }
}

#[async_trait]
impl SessionRepository for MokaSessionRepository {
    async fn create_session(&self, seed: SessionSeed, ttl_ms: u64, client_ip: Option<String>) -> Result<Session> {
        let token = generate_session_token();
        let session = Session::new(token.clone(), seed, ttl_ms, client_ip);

        self.sessions.insert(token.clone(), session.clone()).await;
        self.index_token(&session.principal.id, &token).await;

        Ok(session)
    }

    async fn restore_session(&self, session: Session) -> Result<()> {
        let token = session.token.clone();
        let principal_id = session.principal.id.clone();

        self.sessions.insert(token.clone(), session).await;
        self.index_token(&principal_id, &token).await;

        Ok(())
    }

    async fn get_session(&self, token: &SessionToken) -> Result<Session> {
        let session = self
            .sessions
            .get(token)
            .await
            .ok_or(shared::Error::NotFound)?;

        if session.is_expired() {
            self.sessions.invalidate(token).await;
            return Err(shared::Error::Expired);
        }

        self.modify_session(token, Box::new(Session::update_last_accessed))
            .await?
            .ok_or(shared::Error::NotFound)
    }

    async fn delete_session(&self, token: &SessionToken) -> Result<Option<Session>> {
        let session = self.sessions.remove(token).await;

        if let Some(data) = &session {
            if let Some(tokens_lock) = self.principal_sessions.get(&data.principal.id).await {
                tokens_lock.write().retain(|t| t != token);
            }
        }

        Ok(session)
    }

    async fn session_exists(&self, token: &SessionToken) -> Result<bool> {
        Ok(self
            .sessions
            .get(token)
            .await
            .is_some_and(|session| !session.is_expired()))
    }

    async fn get_principal_sessions(&self, principal_id: &str) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();

        let Some((tokens_lock, token_list)) = self.principal_tokens(principal_id).await else {
            return Ok(sessions);
        };

        let mut valid_tokens = Vec::new();
        for token in token_list.iter() {
            if let Some(session) = self.sessions.get(token).await {
                if !session.is_expired() {
                    valid_tokens.push(token.clone());
                    sessions.push(session);
                }
            }
        }

        // Lazy cleanup of dead tokens
        if valid_tokens.len() != token_list.len() {
            *tokens_lock.write() = valid_tokens;
        }

        Ok(sessions)
    }

    async fn delete_principal_sessions(&self, principal_id: &str) -> Result<Vec<SessionToken>> {
        let mut removed = Vec::new();

        if let Some((_, token_list)) = self.principal_tokens(principal_id).await {
            for token in token_list {
                if self.sessions.remove(&token).await.is_some() {
                    removed.push(token);
                }
            }

            self.principal_sessions.invalidate(principal_id).await;
        }

        Ok(removed)
    }

    async fn modify_session(&self, token: &SessionToken, edit: SessionEdit) -> Result<Option<Session>> {
        let mut edited = None;

        // Compute runs under the entry's lock, so a concurrent remove
        // either happens first (Nop) or after the write.
        self.sessions
            .entry(token.clone())
            .and_compute_with(|entry| {
                let op = match entry {
                    Some(entry) => {
                        let mut session = entry.into_value();
                        edit(&mut session);
                        edited = Some(session.clone());
                        Op::Put(session)
                    }
                    None => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        Ok(edited)
    }
}
