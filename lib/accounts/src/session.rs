//! Server-side sessions for signed-in users.
//!
//! The session cookie carries only the [`SessionId`]; everything else is
//! looked up from a [`SessionStore`](crate::SessionStore).

use chrono::{DateTime, Duration, Utc};
use gatehouse_core::UserId;
use serde::{Deserialize, Serialize};

use crate::token::friendly_token;

/// Length of generated session IDs.
const SESSION_ID_LENGTH: usize = 32;

/// Opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session ID from an existing value (e.g. a cookie).
    #[must_use]
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Generates a fresh random session ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(friendly_token(SESSION_ID_LENGTH))
    }

    /// Returns the session ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An active sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    user_id: UserId,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    /// Whether the user asked to be remembered on this sign-in.
    remembered: bool,
}

impl Session {
    /// Creates a session for `user_id` valid for `duration`.
    #[must_use]
    pub fn new(id: SessionId, user_id: UserId, duration: Duration, remembered: bool) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            created_at: now,
            expires_at: now + duration,
            remembered,
        }
    }

    /// Reconstitutes a session from storage.
    #[must_use]
    pub fn with_all_fields(
        id: SessionId,
        user_id: UserId,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        remembered: bool,
    ) -> Self {
        Self {
            id,
            user_id,
            created_at,
            expires_at,
            remembered,
        }
    }

    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    #[must_use]
    pub fn remembered(&self) -> bool {
        self.remembered
    }

    /// Returns true if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns the remaining time until expiration, or zero if expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        let remaining = self.expires_at - Utc::now();
        if remaining < Duration::zero() {
            Duration::zero()
        } else {
            remaining
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_random() {
        let first = SessionId::generate();
        let second = SessionId::generate();
        assert_eq!(first.as_str().len(), SESSION_ID_LENGTH);
        assert_ne!(first, second);
    }

    #[test]
    fn new_session_is_not_expired() {
        let session = Session::new(
            SessionId::from("sess_abc"),
            UserId::new(),
            Duration::hours(2),
            false,
        );
        assert!(!session.is_expired());
        assert!(!session.remembered());
        assert!(session.remaining() > Duration::minutes(119));
    }

    #[test]
    fn past_session_is_expired() {
        let now = Utc::now();
        let session = Session::with_all_fields(
            SessionId::from("sess_old"),
            UserId::new(),
            now - Duration::hours(3),
            now - Duration::hours(1),
            true,
        );
        assert!(session.is_expired());
        assert_eq!(session.remaining(), Duration::zero());
    }
}
