//! Storage traits for accounts and sessions.

use async_trait::async_trait;
use gatehouse_core::UserId;

use crate::error::StoreError;
use crate::provider::Provider;
use crate::session::{Session, SessionId};
use crate::user::User;

/// Outcome of inserting a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    /// The row was written.
    Created,
    /// Another account already holds the `(provider, uid)` pair; nothing
    /// was written.
    ProviderConflict,
}

/// Persistence for user accounts.
///
/// Implementations must enforce two uniqueness rules atomically with
/// `insert`: one account per `(provider, uid)` among provider accounts, and
/// one account per email.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Finds an account by ID.
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Finds the provider account keyed by `(provider, uid)`.
    ///
    /// An absent `uid` is matched against an absent stored uid of the same
    /// provider; it is never a wildcard.
    async fn find_by_provider_uid(
        &self,
        provider: Provider,
        uid: Option<&str>,
    ) -> Result<Option<User>, StoreError>;

    /// Finds an account by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Finds the account holding a reset token digest.
    async fn find_by_reset_token(&self, token_digest: &str) -> Result<Option<User>, StoreError>;

    /// Inserts a new account.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmailTaken`] if the email is in use.
    async fn insert(&self, user: &User) -> Result<Inserted, StoreError>;

    /// Writes every mutable column of an existing account.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the account does not exist and
    /// [`StoreError::EmailTaken`] if a changed email is in use.
    async fn update(&self, user: &User) -> Result<(), StoreError>;
}

/// Persistence for sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores a new session.
    async fn create(&self, session: &Session) -> Result<(), StoreError>;

    /// Finds a session by ID.
    async fn find(&self, id: &SessionId) -> Result<Option<Session>, StoreError>;

    /// Deletes a session (sign out).
    async fn delete(&self, id: &SessionId) -> Result<(), StoreError>;

    /// Deletes every session of a user.
    async fn delete_for_user(&self, user_id: UserId) -> Result<u64, StoreError>;

    /// Deletes expired sessions, returning how many were removed.
    async fn delete_expired(&self) -> Result<u64, StoreError>;
}
