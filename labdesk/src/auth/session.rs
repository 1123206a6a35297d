use super::models::{AccessProfile, Principal, StaffProfile};
use crate::access::GateTracker;
use chrono::DateTime;
use std::time::{SystemTime, UNIX_EPOCH};

/// Session token type - a secure random string
pub type SessionToken = String;

/// Get current timestamp in milliseconds since Unix epoch
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Format a timestamp (ms since epoch) as ISO 8601 UTC string
pub fn format_utc_time(timestamp_ms: u64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms as i64)
        .unwrap_or_default()
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

/// Everything a session is built from, minus the bookkeeping.
#[derive(Debug, Clone)]
pub struct SessionSeed {
    pub principal: Principal,
    pub staff: Option<StaffProfile>,
    pub bearer_token: String,
    pub access: AccessProfile,
}

/// A signed-in console session with tracking metadata
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub principal: Principal,
    pub staff: Option<StaffProfile>,
    /// Backend token attached to forwarded requests
    pub bearer_token: String,
    pub access: AccessProfile,
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
    /// `created_at` as ISO 8601 UTC
    pub created_at_utc: String,
    /// Milliseconds since the Unix epoch
    pub expires_at: u64,
    /// Milliseconds since the Unix epoch
    pub last_accessed: u64,
    /// `last_accessed` as ISO 8601 UTC
    pub last_accessed_utc: String,
    pub client_ip: Option<String>,
    /// Gate decision cache, rebuilt per process
    pub gate: GateTracker,
}

impl Session {
    /// Create a new session with the given token, seed, TTL, and optional client IP
    pub fn new(token: SessionToken, seed: SessionSeed, ttl_ms: u64, client_ip: Option<String>) -> Self {
        let now = current_timestamp_ms();
        let now_utc = format_utc_time(now);

        Self {
            token,
            principal: seed.principal,
            staff: seed.staff,
            bearer_token: seed.bearer_token,
            access: seed.access,
            created_at: now,
            created_at_utc: now_utc.clone(),
            expires_at: now + ttl_ms,
            last_accessed: now,
            last_accessed_utc: now_utc,
            client_ip,
            gate: GateTracker::default(),
        }
    }

    /// Check if this session has expired
    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() >= self.expires_at
    }

    /// Update the last_accessed timestamp to current time
    pub fn update_last_accessed(&mut self) {
        let now = current_timestamp_ms();
        self.last_accessed = now;
        self.last_accessed_utc = format_utc_time(now);
    }

    /// Get remaining time to live in milliseconds
    pub fn remaining_ttl_ms(&self) -> u64 {
        self.expires_at.saturating_sub(current_timestamp_ms())
    }
}

/// Generate a cryptographically secure random session token
pub fn generate_session_token() -> SessionToken {
    use rand::Rng;

    // 32 random bytes, hex encoded (64 characters)
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::models::PermissionSet;

    pub(crate) fn seed(principal_id: &str, permissions: &[&str]) -> SessionSeed {
        let permissions: PermissionSet = permissions.iter().copied().collect();
        SessionSeed {
            principal: Principal {
                id: principal_id.to_string(),
                name: format!("User {principal_id}"),
                email: format!("{principal_id}@lab.example"),
                phone: None,
                avatar: None,
            },
            staff: Some(StaffProfile {
                id: format!("staff-{principal_id}"),
                designation: None,
                permissions: permissions.clone(),
            }),
            bearer_token: format!("bearer-{principal_id}"),
            access: AccessProfile::staff(permissions),
        }
    }

    #[test]
    fn test_generate_session_token() {
        let token1 = generate_session_token();
        let token2 = generate_session_token();

        assert_eq!(token1.len(), 64);
        assert_eq!(token2.len(), 64);
        assert_ne!(token1, token2);
        assert!(token1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_session_creation() {
        let token = "test_token_123".to_string();
        let session = Session::new(
            token.clone(),
            seed("u1", &["manage-package"]),
            3_600_000,
            Some("127.0.0.1".to_string()),
        );

        assert_eq!(session.token, token);
        assert_eq!(session.principal.id, "u1");
        assert_eq!(session.bearer_token, "bearer-u1");
        assert_eq!(session.client_ip, Some("127.0.0.1".to_string()));
        assert!(!session.is_expired());
        assert!(session.remaining_ttl_ms() > 0);
    }

    #[test]
    fn test_session_expiration() {
        let session = Session::new("t".to_string(), seed("u1", &[]), 0, None);

        assert!(session.is_expired());
        assert_eq!(session.remaining_ttl_ms(), 0);
    }

    #[test]
    fn test_format_utc_time() {
        assert_eq!(format_utc_time(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_utc_time(1_700_000_000_000), "2023-11-14T22:13:20Z");
    }
}
