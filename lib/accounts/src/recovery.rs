//! Password recovery by reset token.
//!
//! Only a digest of the token is stored. The raw token is returned once to
//! the caller, which delivers it to the account holder.

use chrono::Utc;
use tracing::{info, instrument};

use crate::accounts::Accounts;
use crate::error::{AccountError, ValidationErrors};
use crate::password;
use crate::token::{digest, friendly_token};
use crate::user::User;
use crate::validation::{check_password, normalize_email};

/// Length of raw reset tokens.
pub const RESET_TOKEN_LENGTH: usize = 20;

impl Accounts {
    /// Issues a reset token for the account with `email`.
    ///
    /// Returns the raw token, or `None` when no account uses the email.
    /// Issuing a new token replaces any pending one.
    #[instrument(skip_all)]
    pub async fn send_reset_password_instructions(
        &self,
        email: &str,
    ) -> Result<Option<String>, AccountError> {
        let email = normalize_email(email);
        let Some(mut user) = self.users.find_by_email(&email).await? else {
            return Ok(None);
        };

        let raw = friendly_token(RESET_TOKEN_LENGTH);
        user.start_password_reset(digest(&raw), Utc::now());
        self.users.update(&user).await?;

        info!(user_id = %user.id(), "issued reset password token");
        Ok(Some(raw))
    }

    /// Sets a new password using a reset token and consumes the token.
    ///
    /// # Errors
    ///
    /// [`AccountError::InvalidResetToken`] for unknown tokens,
    /// [`AccountError::ResetTokenExpired`] for tokens older than the reset
    /// window, and [`AccountError::Validation`] for a rejected password.
    #[instrument(skip_all)]
    pub async fn reset_password_by_token(
        &self,
        raw_token: &str,
        new_password: &str,
        confirmation: Option<&str>,
    ) -> Result<User, AccountError> {
        if raw_token.is_empty() {
            return Err(AccountError::InvalidResetToken);
        }
        let Some(mut user) = self.users.find_by_reset_token(&digest(raw_token)).await? else {
            return Err(AccountError::InvalidResetToken);
        };
        if !user.reset_period_valid(self.config.reset_password_within(), Utc::now()) {
            return Err(AccountError::ResetTokenExpired);
        }

        let mut errors = ValidationErrors::new();
        if self.config.validatable {
            check_password(new_password, confirmation, &self.config, &mut errors);
        } else if new_password.is_empty() {
            errors.add("password", "can't be blank");
        }
        errors.into_result()?;

        user.set_encrypted_password(password::hash(new_password)?);
        user.clear_password_reset();
        self.users.update(&user).await?;

        info!(user_id = %user.id(), "reset password");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::config::AuthConfig;
    use crate::memory::MemoryUserStore;
    use crate::registration::Registration;
    use crate::store::UserStore;

    async fn registered() -> (Accounts, Arc<MemoryUserStore>, User) {
        let store = Arc::new(MemoryUserStore::new());
        let accounts = Accounts::new(store.clone(), AuthConfig::default());
        let user = accounts
            .register(Registration {
                email: "erin@example.com".to_string(),
                password: "secret123".to_string(),
                ..Registration::default()
            })
            .await
            .expect("register");
        (accounts, store, user)
    }

    #[tokio::test]
    async fn unknown_email_issues_nothing() {
        let (accounts, _store, _user) = registered().await;

        let token = accounts
            .send_reset_password_instructions("nobody@example.com")
            .await
            .expect("send");

        assert!(token.is_none());
    }

    #[tokio::test]
    async fn token_is_stored_as_digest() {
        let (accounts, store, user) = registered().await;

        let token = accounts
            .send_reset_password_instructions("ERIN@example.com")
            .await
            .expect("send")
            .expect("token");

        assert_eq!(token.len(), RESET_TOKEN_LENGTH);
        let stored = store
            .find_by_id(user.id())
            .await
            .expect("find")
            .expect("present");
        let reset = stored.password_reset().expect("pending reset");
        assert_eq!(reset.token_digest, digest(&token));
        assert_ne!(reset.token_digest, token);
    }

    #[tokio::test]
    async fn reset_changes_password_and_consumes_token() {
        let (accounts, _store, _user) = registered().await;
        let token = accounts
            .send_reset_password_instructions("erin@example.com")
            .await
            .expect("send")
            .expect("token");

        let user = accounts
            .reset_password_by_token(&token, "brand-new", Some("brand-new"))
            .await
            .expect("reset");

        assert!(password::verify("brand-new", user.encrypted_password()));
        assert!(user.password_reset().is_none());
        assert_eq!(
            accounts
                .reset_password_by_token(&token, "another-one", None)
                .await,
            Err(AccountError::InvalidResetToken)
        );
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let (accounts, store, user) = registered().await;
        let mut stored = store
            .find_by_id(user.id())
            .await
            .expect("find")
            .expect("present");
        stored.start_password_reset(digest("old-token"), Utc::now() - Duration::hours(7));
        store.update(&stored).await.expect("update");

        assert_eq!(
            accounts
                .reset_password_by_token("old-token", "brand-new", None)
                .await,
            Err(AccountError::ResetTokenExpired)
        );
    }

    #[tokio::test]
    async fn invalid_new_password_keeps_token() {
        let (accounts, store, user) = registered().await;
        let token = accounts
            .send_reset_password_instructions("erin@example.com")
            .await
            .expect("send")
            .expect("token");

        let err = accounts
            .reset_password_by_token(&token, "short", None)
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::Validation(ref errors) if errors.has("password")));
        let stored = store
            .find_by_id(user.id())
            .await
            .expect("find")
            .expect("present");
        assert!(stored.password_reset().is_some());
    }

    #[tokio::test]
    async fn blank_token_is_invalid() {
        let (accounts, _store, _user) = registered().await;
        assert_eq!(
            accounts.reset_password_by_token("", "brand-new", None).await,
            Err(AccountError::InvalidResetToken)
        );
    }
}
