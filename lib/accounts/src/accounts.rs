//! The account service.
//!
//! [`Accounts`] pairs a [`UserStore`] with the active [`AuthConfig`]. Its
//! operations are split by capability across the `oauth`, `registration`,
//! `authentication`, and `recovery` modules.

use std::sync::Arc;

use gatehouse_core::UserId;

use crate::config::AuthConfig;
use crate::error::AccountError;
use crate::store::UserStore;
use crate::user::User;

/// Account operations over a user store.
#[derive(Clone)]
pub struct Accounts {
    pub(crate) users: Arc<dyn UserStore>,
    pub(crate) config: AuthConfig,
}

impl Accounts {
    /// Creates the service.
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, config: AuthConfig) -> Self {
        Self { users, config }
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Loads an account by ID.
    pub async fn find(&self, id: UserId) -> Result<Option<User>, AccountError> {
        Ok(self.users.find_by_id(id).await?)
    }
}

impl std::fmt::Debug for Accounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accounts")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
