//! Session Management
//!
//! Every handler works on an explicit [`SessionState`]; the hosting layer only
//! locates it by [`SessionId`] and persists it between requests.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use snapvisa_pipeline::ProcessedImage;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::token::AntiForgeryToken;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A hosted checkout that has been started but not yet confirmed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCheckout {
    /// Provider's checkout session ID
    pub checkout_id: String,

    /// Nonce embedded in the success URL
    pub nonce: AntiForgeryToken,

    pub started_at: DateTime<Utc>,
}

/// Everything the service knows about one visitor
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionState {
    pub id: SessionId,

    /// Paid; downloads are unlimited
    pub entitled: bool,

    /// Downloads consumed under the free allowance
    pub free_downloads_used: u32,

    /// Current processed photo, replaced on every upload
    pub image: Option<ProcessedImage>,

    pub pending_checkout: Option<PendingCheckout>,

    token: AntiForgeryToken,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::with_id(SessionId::new())
    }

    pub fn with_id(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            entitled: false,
            free_downloads_used: 0,
            image: None,
            pending_checkout: None,
            token: AntiForgeryToken::generate(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Current anti-forgery token
    pub const fn token(&self) -> &AntiForgeryToken {
        &self.token
    }

    pub fn verify_token(&self, presented: Option<&str>) -> Result<()> {
        self.token.verify(presented)
    }

    /// Replace the anti-forgery token after a state change.
    pub fn rotate_token(&mut self) -> &AntiForgeryToken {
        self.token = AntiForgeryToken::generate();
        &self.token
    }

    /// Verify `presented` and rotate it in one step, so it is spent even if
    /// the action it guards has not finished yet.
    ///
    /// Returns the spent token for [`restore_token`](Self::restore_token).
    pub fn consume_token(&mut self, presented: Option<&str>) -> Result<AntiForgeryToken> {
        self.verify_token(presented)?;
        Ok(std::mem::replace(&mut self.token, AntiForgeryToken::generate()))
    }

    /// Hand back a token spent by [`consume_token`](Self::consume_token)
    /// when the guarded action failed. Does nothing if the token issued in
    /// its place has already been rotated again.
    pub fn restore_token(&mut self, spent: AntiForgeryToken, issued: &str) -> bool {
        if !self.token.matches(issued) {
            return false;
        }
        self.token = spent;
        true
    }

    /// Stage a newly processed photo, replacing any previous one.
    pub fn stage_image(&mut self, image: ProcessedImage) {
        self.image = Some(image);
        self.rotate_token();
        self.touch();
    }

    pub const fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub const fn free_downloads_remaining(&self, allowance: u32) -> u32 {
        allowance.saturating_sub(self.free_downloads_used)
    }

    pub fn grant_entitlement(&mut self) {
        if !self.entitled {
            tracing::info!(session = %self.id, "Entitlement granted");
        }
        self.entitled = true;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Idle longer than `ttl`
    pub fn is_expired(&self, ttl: TimeDelta, now: DateTime<Utc>) -> bool {
        now - self.updated_at > ttl
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Session store trait for persistence
pub trait SessionStore: Send + Sync {
    /// Save a session
    fn save(&self, session: &SessionState) -> Result<()>;

    /// Load a live session by ID
    fn load(&self, id: &SessionId) -> Result<Option<SessionState>>;

    /// Delete a session
    fn delete(&self, id: &SessionId) -> Result<()>;

    /// Drop idle sessions, returning how many were removed
    fn purge_expired(&self) -> Result<usize>;

    /// Apply `f` to the session atomically, starting a fresh session when
    /// `id` has none.
    ///
    /// `f` runs on a working copy while the store is locked. The copy
    /// replaces the stored session only if `f` succeeds, so a rejected
    /// request leaves the session exactly as it was. Async work must happen
    /// outside `f`; commit only the fields the operation owns.
    fn update<R>(&self, id: &SessionId, f: impl FnOnce(&mut SessionState) -> Result<R>) -> Result<R>
    where
        Self: Sized;

    /// Like [`update`](Self::update), but only for a live session.
    ///
    /// Returns `None` without storing anything when `id` is unknown or expired.
    fn update_live<R>(
        &self,
        id: &SessionId,
        f: impl FnOnce(&mut SessionState) -> Result<R>,
    ) -> Result<Option<R>>
    where
        Self: Sized;
}

/// In-memory session store
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionState>>,
    ttl: TimeDelta,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(TimeDelta::hours(1))
    }
}

impl MemorySessionStore {
    pub fn new(ttl: TimeDelta) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub const fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Number of stored sessions, live or not
    pub fn len(&self) -> usize {
        self.sessions.read().map_or(0, |sessions| sessions.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make sure a live session exists for `id`.
    ///
    /// Returns `true` when a fresh session was created.
    pub fn ensure(&self, id: &SessionId) -> Result<bool> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        let now = Utc::now();

        let live = sessions
            .get(id)
            .is_some_and(|session| !session.is_expired(self.ttl, now));
        if !live {
            sessions.insert(id.clone(), SessionState::with_id(id.clone()));
        }

        Ok(!live)
    }

    /// Run `f` on a copy of the live session for `id` (or a fresh one when
    /// `create` is set) and commit the copy if `f` succeeds.
    fn commit<R>(
        &self,
        id: &SessionId,
        create: bool,
        f: impl FnOnce(&mut SessionState) -> Result<R>,
    ) -> Result<Option<R>> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        let now = Utc::now();

        let mut working = match sessions.get(id) {
            Some(session) if !session.is_expired(self.ttl, now) => session.clone(),
            _ if create => SessionState::with_id(id.clone()),
            _ => return Ok(None),
        };

        let result = f(&mut working)?;
        working.touch();
        sessions.insert(id.clone(), working);

        Ok(Some(result))
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &SessionState) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn load(&self, id: &SessionId) -> Result<Option<SessionState>> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        let now = Utc::now();
        Ok(sessions
            .get(id)
            .filter(|session| !session.is_expired(self.ttl, now))
            .cloned())
    }

    fn delete(&self, id: &SessionId) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        sessions.remove(id);
        Ok(())
    }

    fn purge_expired(&self) -> Result<usize> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(self.ttl, now));

        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!(removed, "Purged expired sessions");
        }
        Ok(removed)
    }

    fn update<R>(&self, id: &SessionId, f: impl FnOnce(&mut SessionState) -> Result<R>) -> Result<R> {
        self.commit(id, true, f)?
            .ok_or_else(|| CoreError::Internal("session was not created".into()))
    }

    fn update_live<R>(
        &self,
        id: &SessionId,
        f: impl FnOnce(&mut SessionState) -> Result<R>,
    ) -> Result<Option<R>> {
        self.commit(id, false, f)
    }
}

fn poisoned() -> CoreError {
    CoreError::Internal("session store lock poisoned".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let session = SessionState::new();
        assert!(!session.entitled);
        assert_eq!(session.free_downloads_used, 0);
        assert!(!session.has_image());
        assert_eq!(session.free_downloads_remaining(1), 1);
    }

    #[test]
    fn test_rotate_invalidates_old_token() {
        let mut session = SessionState::new();
        let old = session.token().as_str().to_string();
        session.rotate_token();

        assert!(session.verify_token(Some(&old)).is_err());
        let current = session.token().as_str().to_string();
        assert!(session.verify_token(Some(&current)).is_ok());
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::default();
        let session = SessionState::new();
        let id = session.id.clone();

        store.save(&session).unwrap();
        let loaded = store.load(&id).unwrap();
        assert_eq!(loaded.unwrap().id, id);

        store.delete(&id).unwrap();
        assert!(store.load(&id).unwrap().is_none());
    }

    #[test]
    fn test_failed_update_leaves_session_untouched() {
        let store = MemorySessionStore::default();
        let id = SessionId::new();
        assert!(store.ensure(&id).unwrap());
        assert!(!store.ensure(&id).unwrap());
        let before = store.load(&id).unwrap().unwrap();

        let result: Result<()> = store.update(&id, |session| {
            session.grant_entitlement();
            session.rotate_token();
            Err(CoreError::Permission("nope".into()))
        });
        assert!(result.is_err());

        let after = store.load(&id).unwrap().unwrap();
        assert!(!after.entitled);
        assert_eq!(after.token(), before.token());
    }

    #[test]
    fn test_update_live_skips_unknown_sessions() {
        let store = MemorySessionStore::default();
        let id = SessionId::new();

        let touched = store
            .update_live(&id, |session| {
                session.grant_entitlement();
                Ok(())
            })
            .unwrap();
        assert!(touched.is_none());
        assert!(store.is_empty());

        store.ensure(&id).unwrap();
        let touched = store
            .update_live(&id, |session| {
                session.grant_entitlement();
                Ok(())
            })
            .unwrap();
        assert!(touched.is_some());
        assert!(store.load(&id).unwrap().unwrap().entitled);
    }

    #[test]
    fn test_consumed_token_is_spent_until_restored() {
        let mut session = SessionState::new();
        let original = session.token().as_str().to_string();

        assert!(session.consume_token(Some("stale")).is_err());
        assert_eq!(session.token().as_str(), original);

        let spent = session.consume_token(Some(&original)).unwrap();
        assert!(session.verify_token(Some(&original)).is_err());
        assert!(session.consume_token(Some(&original)).is_err());

        let issued = session.token().as_str().to_string();
        assert!(session.restore_token(spent.clone(), &issued));
        assert!(session.verify_token(Some(&original)).is_ok());

        // A newer rotation wins over a late restore
        session.rotate_token();
        assert!(!session.restore_token(spent, &original));
        assert!(session.verify_token(Some(&original)).is_err());
    }

    #[test]
    fn test_expired_sessions_are_replaced() {
        let store = MemorySessionStore::new(TimeDelta::seconds(60));
        let mut stale = SessionState::new();
        stale.entitled = true;
        stale.updated_at = Utc::now() - TimeDelta::seconds(120);
        let id = stale.id.clone();
        store.save(&stale).unwrap();

        assert!(store.load(&id).unwrap().is_none());
        assert!(store.ensure(&id).unwrap());
        assert!(!store.load(&id).unwrap().unwrap().entitled);
    }

    #[test]
    fn test_purge_expired() {
        let store = MemorySessionStore::new(TimeDelta::seconds(60));
        let mut stale = SessionState::new();
        stale.updated_at = Utc::now() - TimeDelta::seconds(61);
        store.save(&stale).unwrap();
        store.save(&SessionState::new()).unwrap();

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.len(), 1);
    }
}
