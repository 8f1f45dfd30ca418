//! Self-service sign-up and account editing.

use gatehouse_core::UserId;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::accounts::Accounts;
use crate::error::{AccountError, StoreError, ValidationErrors};
use crate::password;
use crate::store::Inserted;
use crate::user::User;
use crate::validation::{check_email, check_password, normalize_email, validate_new_account};

/// Sign-up form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub password_confirmation: Option<String>,
    pub name: Option<String>,
}

/// Account edit form. Blank fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
    /// Required to authorize any change.
    #[serde(default)]
    pub current_password: String,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Accounts {
    /// Creates an account from a sign-up form.
    ///
    /// The new account has no roles; callers assign defaults explicitly.
    #[instrument(skip_all)]
    pub async fn register(&self, registration: Registration) -> Result<User, AccountError> {
        let email = normalize_email(&registration.email);
        validate_new_account(
            &email,
            &registration.password,
            registration.password_confirmation.as_deref(),
            &self.config,
        )?;

        let mut user = User::new(email, password::hash(&registration.password)?);
        user.set_name(non_blank(registration.name));

        match self.users.insert(&user).await? {
            Inserted::Created => {
                info!(user_id = %user.id(), "registered account");
                Ok(user)
            }
            Inserted::ProviderConflict => Err(AccountError::Store(StoreError::Backend {
                details: "provider conflict for an account without provider".to_string(),
            })),
        }
    }

    /// Applies an account edit after checking the current password.
    #[instrument(skip(self, update), fields(user_id = %id))]
    pub async fn update_account(
        &self,
        id: UserId,
        update: AccountUpdate,
    ) -> Result<User, AccountError> {
        let mut user = self.users.find_by_id(id).await?.ok_or(AccountError::NotFound)?;

        if update.current_password.is_empty() {
            return Err(ValidationErrors::single("current_password", "can't be blank").into());
        }
        if !password::verify(&update.current_password, user.encrypted_password()) {
            return Err(ValidationErrors::single("current_password", "is invalid").into());
        }

        let mut errors = ValidationErrors::new();
        let email = non_blank(update.email).map(|e| normalize_email(&e));
        let new_password = non_blank(update.password);

        if self.config.validatable {
            if let Some(email) = &email {
                check_email(email, &mut errors);
            }
            if let Some(new_password) = &new_password {
                check_password(
                    new_password,
                    update.password_confirmation.as_deref(),
                    &self.config,
                    &mut errors,
                );
            }
        }
        errors.into_result()?;

        if let Some(email) = email
            && email != user.email()
        {
            user.set_email(email);
        }
        if let Some(name) = update.name {
            user.set_name(non_blank(Some(name)));
        }
        if let Some(new_password) = new_password {
            user.set_encrypted_password(password::hash(&new_password)?);
        }

        self.users.update(&user).await?;
        info!("updated account");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::AuthConfig;
    use crate::memory::MemoryUserStore;
    use crate::store::UserStore;

    fn accounts() -> (Accounts, Arc<MemoryUserStore>) {
        let store = Arc::new(MemoryUserStore::new());
        (
            Accounts::new(store.clone(), AuthConfig::default()),
            store,
        )
    }

    fn registration(email: &str) -> Registration {
        Registration {
            email: email.to_string(),
            password: "secret123".to_string(),
            password_confirmation: Some("secret123".to_string()),
            name: Some("Bob".to_string()),
        }
    }

    #[tokio::test]
    async fn register_creates_account_without_provider() {
        let (accounts, store) = accounts();

        let user = accounts
            .register(registration("Bob@Example.com"))
            .await
            .expect("register");

        assert_eq!(user.email(), "bob@example.com");
        assert_eq!(user.name(), Some("Bob"));
        assert!(user.provider().is_none());
        assert!(user.roles().is_empty());
        assert!(password::verify("secret123", user.encrypted_password()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let (accounts, _store) = accounts();
        accounts.register(registration("bob@example.com")).await.expect("first");

        let err = accounts
            .register(registration("BOB@example.com"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AccountError::Validation(ValidationErrors::single("email", "has already been taken"))
        );
    }

    #[tokio::test]
    async fn register_validates_fields() {
        let (accounts, store) = accounts();
        let form = Registration {
            email: "not-an-email".to_string(),
            password: "123".to_string(),
            password_confirmation: Some("1234".to_string()),
            name: None,
        };

        let err = accounts.register(form).await.unwrap_err();

        match err {
            AccountError::Validation(errors) => {
                assert!(errors.has("email"));
                assert!(errors.has("password"));
                assert!(errors.has("password_confirmation"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn update_requires_current_password() {
        let (accounts, _store) = accounts();
        let user = accounts.register(registration("bob@example.com")).await.expect("register");

        let err = accounts
            .update_account(
                user.id(),
                AccountUpdate {
                    name: Some("Robert".to_string()),
                    current_password: "wrong".to_string(),
                    ..AccountUpdate::default()
                },
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AccountError::Validation(ValidationErrors::single("current_password", "is invalid"))
        );
    }

    #[tokio::test]
    async fn update_changes_email_name_and_password() {
        let (accounts, store) = accounts();
        let user = accounts.register(registration("bob@example.com")).await.expect("register");

        let updated = accounts
            .update_account(
                user.id(),
                AccountUpdate {
                    email: Some("Robert@Example.com".to_string()),
                    name: Some("Robert".to_string()),
                    password: Some("new-secret".to_string()),
                    password_confirmation: Some("new-secret".to_string()),
                    current_password: "secret123".to_string(),
                },
            )
            .await
            .expect("update");

        assert_eq!(updated.email(), "robert@example.com");
        assert_eq!(updated.name(), Some("Robert"));
        let stored = store
            .find_by_id(user.id())
            .await
            .expect("find")
            .expect("present");
        assert!(password::verify("new-secret", stored.encrypted_password()));
    }

    #[tokio::test]
    async fn update_leaves_blank_password_unchanged() {
        let (accounts, _store) = accounts();
        let user = accounts.register(registration("bob@example.com")).await.expect("register");

        let updated = accounts
            .update_account(
                user.id(),
                AccountUpdate {
                    password: Some(String::new()),
                    current_password: "secret123".to_string(),
                    ..AccountUpdate::default()
                },
            )
            .await
            .expect("update");

        assert_eq!(updated.encrypted_password(), user.encrypted_password());
    }
}
