//! In-memory stores for tests and local development.
//!
//! Each store guards its map with a single mutex, so the uniqueness checks
//! in `insert` are atomic like a database unique index.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use gatehouse_core::UserId;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::provider::Provider;
use crate::session::{Session, SessionId};
use crate::store::{Inserted, SessionStore, UserStore};
use crate::user::User;

/// In-memory [`UserStore`].
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<UserId, User>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    /// Returns true when no accounts are stored.
    pub async fn is_empty(&self) -> bool {
        self.users.lock().await.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn find_by_provider_uid(
        &self,
        provider: Provider,
        uid: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.matches_identity(provider, uid))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.email() == email)
            .cloned())
    }

    async fn find_by_reset_token(&self, token_digest: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| {
                user.password_reset()
                    .is_some_and(|reset| reset.token_digest == token_digest)
            })
            .cloned())
    }

    async fn insert(&self, user: &User) -> Result<Inserted, StoreError> {
        let mut users = self.users.lock().await;

        if let Some(provider) = user.provider()
            && users
                .values()
                .any(|existing| existing.matches_identity(provider, user.uid()))
        {
            return Ok(Inserted::ProviderConflict);
        }
        if users.values().any(|existing| existing.email() == user.email()) {
            return Err(StoreError::EmailTaken);
        }

        users.insert(user.id(), user.clone());
        Ok(Inserted::Created)
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.lock().await;

        if !users.contains_key(&user.id()) {
            return Err(StoreError::NotFound);
        }
        if users
            .values()
            .any(|existing| existing.id() != user.id() && existing.email() == user.email())
        {
            return Err(StoreError::EmailTaken);
        }

        users.insert(user.id(), user.clone());
        Ok(())
    }
}

/// In-memory [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Returns true when no sessions are stored.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .await
            .insert(session.id().clone(), session.clone());
        Ok(())
    }

    async fn find(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.lock().await.get(id).cloned())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        self.sessions.lock().await.remove(id);
        Ok(())
    }

    async fn delete_for_user(&self, user_id: UserId) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.user_id() != user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at() > now);
        Ok((before - sessions.len()) as u64)
    }
}
