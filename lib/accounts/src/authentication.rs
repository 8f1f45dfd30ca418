//! Password sign-in, sign-in tracking, and remember-me.

use chrono::Utc;
use gatehouse_core::UserId;
use tracing::{debug, instrument};

use crate::accounts::Accounts;
use crate::error::AccountError;
use crate::password;
use crate::session::Session;
use crate::user::User;
use crate::validation::normalize_email;

impl Accounts {
    /// Checks an email and password.
    ///
    /// Unknown emails and wrong passwords fail the same way.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AccountError> {
        if !self.config.database_authenticatable {
            return Err(AccountError::InvalidCredentials);
        }

        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            debug!("no account for email");
            return Err(AccountError::InvalidCredentials);
        };

        if !password::verify(password, user.encrypted_password()) {
            debug!(user_id = %user.id(), "password mismatch");
            return Err(AccountError::InvalidCredentials);
        }
        Ok(user)
    }

    /// Returns true if a sign-in asking to be remembered will be.
    #[must_use]
    pub fn should_remember(&self, requested: bool) -> bool {
        requested && self.config.rememberable
    }

    /// Records a successful sign-in: tracking data and, when requested,
    /// the start of a remembered sign-in.
    #[instrument(skip(self, user, ip), fields(user_id = %user.id()))]
    pub async fn record_sign_in(
        &self,
        mut user: User,
        ip: Option<String>,
        remember: bool,
    ) -> Result<User, AccountError> {
        let now = Utc::now();
        let mut changed = false;

        if self.config.trackable {
            user.track_sign_in(ip, now);
            changed = true;
        }
        if self.should_remember(remember) {
            user.remember(self.config.remember_for(), now);
            changed = true;
        }

        if changed {
            self.users.update(&user).await?;
        }
        Ok(user)
    }

    /// Ends every remembered sign-in of the account.
    pub async fn forget(&self, id: UserId) -> Result<(), AccountError> {
        let Some(mut user) = self.users.find_by_id(id).await? else {
            return Ok(());
        };
        if user.remember_created_at().is_some() {
            user.forget();
            self.users.update(&user).await?;
        }
        Ok(())
    }

    /// Returns true if `session` may still be used by `user`.
    ///
    /// Remembered sessions stop being honored once the account forgot its
    /// remembered sign-ins or the remember period ran out.
    #[must_use]
    pub fn session_valid(&self, user: &User, session: &Session) -> bool {
        if session.is_expired() {
            return false;
        }
        if !session.remembered() {
            return true;
        }
        self.config.rememberable && !user.remember_expired(self.config.remember_for(), Utc::now())
    }
}
