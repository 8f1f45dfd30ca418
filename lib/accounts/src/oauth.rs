//! Provider sign-in: find-or-create by `(provider, uid)`.

use tracing::{debug, info, instrument};

use crate::accounts::Accounts;
use crate::error::{AccountError, StoreError, ValidationErrors};
use crate::password;
use crate::provider::OAuthPayload;
use crate::role::Role;
use crate::store::Inserted;
use crate::token::friendly_token;
use crate::user::User;
use crate::validation::{check_email, normalize_email};

/// Length of the placeholder password given to provider accounts.
pub const GENERATED_PASSWORD_LENGTH: usize = 20;

impl Accounts {
    /// Resolves a provider callback into an account, creating it on first
    /// sign-in.
    ///
    /// An existing account is returned unchanged. A new one copies
    /// `provider`, `uid`, `email`, `name`, and `image` from the payload and
    /// gets a random 20-character password that nobody knows. No roles are
    /// assigned here; see [`Accounts::ensure_default_role`].
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Validation`] if the new account is rejected
    /// (missing or taken email) and [`AccountError::Store`] if the store
    /// fails.
    #[instrument(skip(self, payload), fields(provider = %payload.provider))]
    pub async fn find_for_oauth(&self, payload: &OAuthPayload) -> Result<User, AccountError> {
        let uid = payload.uid.as_deref();

        if let Some(user) = self.users.find_by_provider_uid(payload.provider, uid).await? {
            debug!(user_id = %user.id(), "provider identity already linked");
            return Ok(user);
        }

        let (user, _password) = self.build_provider_user(payload)?;
        match self.users.insert(&user).await {
            Ok(Inserted::Created) => {
                info!(user_id = %user.id(), "created account from provider sign-in");
                Ok(user)
            }
            Ok(Inserted::ProviderConflict) => {
                // A concurrent callback for the same identity inserted first.
                debug!("provider identity linked concurrently, loading winner");
                self.users
                    .find_by_provider_uid(payload.provider, uid)
                    .await?
                    .ok_or(AccountError::NotFound)
            }
            Err(StoreError::EmailTaken) => {
                // The winner of a concurrent callback carries the same email,
                // and the email index may report the clash first.
                match self.users.find_by_provider_uid(payload.provider, uid).await? {
                    Some(winner) => {
                        debug!(user_id = %winner.id(), "provider identity linked concurrently");
                        Ok(winner)
                    }
                    None => Err(StoreError::EmailTaken.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Assigns the `user` role to an account that has no roles yet.
    ///
    /// Account creation assigns no roles, so every creation path calls this
    /// right after creating or resolving the account.
    pub async fn ensure_default_role(&self, mut user: User) -> Result<User, AccountError> {
        if user.roles().is_empty() {
            user.add_role(Role::User);
            self.users.update(&user).await?;
            info!(user_id = %user.id(), role = "user", "assigned default role");
        }
        Ok(user)
    }

    /// Builds an unsaved provider account and returns it with its plain
    /// generated password.
    pub(crate) fn build_provider_user(
        &self,
        payload: &OAuthPayload,
    ) -> Result<(User, String), AccountError> {
        let email = payload
            .info
            .email
            .as_deref()
            .map(normalize_email)
            .unwrap_or_default();

        if self.config.validatable {
            let mut errors = ValidationErrors::new();
            check_email(&email, &mut errors);
            errors.into_result()?;
        }

        let password = friendly_token(GENERATED_PASSWORD_LENGTH);
        let mut user = User::new(email, password::hash(&password)?);
        user.set_identity(payload.provider, payload.uid.clone());
        user.set_name(payload.info.name.clone());
        user.set_image(payload.info.image.clone());
        Ok((user, password))
    }
}
