//! Auth Cache Module
//!
//! TTL store specialised for authorization lookups. Every call site builds
//! keys through the constructors here so lookups agree on key shape.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::ttl_store::TtlStore;
use crate::error::Result;

pub const ROLE_TTL: Duration = Duration::from_secs(5 * 60);
pub const SESSION_TTL: Duration = Duration::from_secs(60);
pub const PERMISSIONS_TTL: Duration = Duration::from_secs(5 * 60);

/// Default interval of the auth cache sweep.
pub const AUTH_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

// == Key Constructors ==
pub fn role_key(user_id: &str) -> String {
    format!("user_role:{user_id}")
}

pub fn session_key(user_id: &str) -> String {
    format!("session_validation:{user_id}")
}

pub fn permissions_key(user_id: &str) -> String {
    format!("user_permissions:{user_id}")
}

/// Cached authorization fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AuthRecord {
    Role(String),
    SessionValid(bool),
    Permissions(Vec<String>),
}

// == Auth Cache ==
/// Shared cache of role, session and permission lookups.
#[derive(Debug, Clone, Default)]
pub struct AuthCache {
    store: Arc<Mutex<TtlStore<AuthRecord>>>,
}

impl AuthCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn put(&self, key: String, record: AuthRecord, ttl: Duration) -> Result<()> {
        self.store.lock().set(key, record, ttl)
    }

    fn fetch(&self, key: &str) -> Option<AuthRecord> {
        self.store.lock().get(key)
    }

    pub fn set_role(&self, user_id: &str, role: impl Into<String>) -> Result<()> {
        self.put(role_key(user_id), AuthRecord::Role(role.into()), ROLE_TTL)
    }

    pub fn role(&self, user_id: &str) -> Option<String> {
        match self.fetch(&role_key(user_id))? {
            AuthRecord::Role(role) => Some(role),
            _ => None,
        }
    }

    pub fn set_session_valid(&self, user_id: &str, valid: bool) -> Result<()> {
        self.put(session_key(user_id), AuthRecord::SessionValid(valid), SESSION_TTL)
    }

    pub fn session_valid(&self, user_id: &str) -> Option<bool> {
        match self.fetch(&session_key(user_id))? {
            AuthRecord::SessionValid(valid) => Some(valid),
            _ => None,
        }
    }

    pub fn set_permissions(&self, user_id: &str, permissions: Vec<String>) -> Result<()> {
        self.put(
            permissions_key(user_id),
            AuthRecord::Permissions(permissions),
            PERMISSIONS_TTL,
        )
    }

    pub fn permissions(&self, user_id: &str) -> Option<Vec<String>> {
        match self.fetch(&permissions_key(user_id))? {
            AuthRecord::Permissions(permissions) => Some(permissions),
            _ => None,
        }
    }

    /// Drops every cached fact about one user, e.g. after a role change or sign-out.
    pub fn invalidate_user(&self, user_id: &str) -> usize {
        let mut store = self.store.lock();
        [role_key(user_id), session_key(user_id), permissions_key(user_id)]
            .iter()
            .filter(|key| store.remove(key).is_some())
            .count()
    }

    /// Removes all entries, or those whose key contains `pattern`.
    pub fn clear(&self, pattern: Option<&str>) -> usize {
        self.store.lock().clear(pattern)
    }

    /// Removes expired entries. Returns the number removed.
    pub fn cleanup(&self) -> usize {
        let removed = self.store.lock().cleanup();
        debug!(removed, "auth cache cleanup");
        removed
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(role_key("42"), "user_role:42");
        assert_eq!(session_key("42"), "session_validation:42");
        assert_eq!(permissions_key("42"), "user_permissions:42");
    }

    #[test]
    fn test_role_roundtrip_and_isolation() {
        let auth = AuthCache::new();
        auth.set_role("u1", "admin").unwrap();

        assert_eq!(auth.role("u1"), Some("admin".to_string()));
        assert_eq!(auth.role("u2"), None);
        assert_eq!(auth.session_valid("u1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_expires_before_role() {
        let auth = AuthCache::new();
        auth.set_role("u1", "editor").unwrap();
        auth.set_session_valid("u1", true).unwrap();

        tokio::time::advance(SESSION_TTL).await;

        assert_eq!(auth.session_valid("u1"), None);
        assert_eq!(auth.role("u1"), Some("editor".to_string()));
    }

    #[test]
    fn test_invalidate_user_only_touches_that_user() {
        let auth = AuthCache::new();
        auth.set_role("1", "admin").unwrap();
        auth.set_permissions("1", vec!["posts:write".into()]).unwrap();
        auth.set_role("12", "viewer").unwrap();

        assert_eq!(auth.invalidate_user("1"), 2);
        assert_eq!(auth.role("1"), None);
        assert_eq!(auth.role("12"), Some("viewer".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_sweeps_unread_entries() {
        let auth = AuthCache::new();
        auth.set_session_valid("a", true).unwrap();
        auth.set_session_valid("b", false).unwrap();
        auth.set_role("a", "admin").unwrap();

        tokio::time::advance(SESSION_TTL + Duration::from_secs(1)).await;

        assert_eq!(auth.cleanup(), 2);
        assert_eq!(auth.len(), 1);
    }

    #[test]
    fn test_clear_by_pattern() {
        let auth = AuthCache::new();
        auth.set_role("a", "admin").unwrap();
        auth.set_permissions("a", vec![]).unwrap();

        assert_eq!(auth.clear(Some("user_permissions")), 1);
        assert_eq!(auth.len(), 1);
    }
}
