//! User account type.
//!
//! A user either registered with an email and password or was created on
//! the first sign-in through an identity provider. Provider accounts are
//! keyed by the `(provider, uid)` pair.

use chrono::{DateTime, Duration, Utc};
use gatehouse_core::UserId;
use serde::{Deserialize, Serialize};

use crate::provider::Provider;
use crate::role::{Role, RoleSet};

/// Pending password reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordReset {
    /// Digest of the raw token that was handed out.
    pub token_digest: String,
    /// When the token was issued.
    pub sent_at: DateTime<Utc>,
}

/// Sign-in bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInTracking {
    pub sign_in_count: i32,
    pub current_sign_in_at: Option<DateTime<Utc>>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
    pub current_sign_in_ip: Option<String>,
    pub last_sign_in_ip: Option<String>,
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    /// Identity provider the account was created through, if any.
    provider: Option<Provider>,
    /// Provider-scoped account identifier.
    uid: Option<String>,
    /// Normalized email address.
    email: String,
    /// Argon2id PHC string.
    #[serde(skip_serializing, default)]
    encrypted_password: String,
    name: Option<String>,
    /// Profile image URL.
    image: Option<String>,
    roles: RoleSet,
    password_reset: Option<PasswordReset>,
    remember_created_at: Option<DateTime<Utc>>,
    tracking: SignInTracking,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new account with a generated ID and no roles.
    #[must_use]
    pub fn new(email: String, encrypted_password: String) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            provider: None,
            uid: None,
            email,
            encrypted_password,
            name: None,
            image: None,
            roles: RoleSet::none(),
            password_reset: None,
            remember_created_at: None,
            tracking: SignInTracking::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstitutes an account from storage.
    #[must_use]
    #[expect(clippy::too_many_arguments)]
    pub fn with_all_fields(
        id: UserId,
        provider: Option<Provider>,
        uid: Option<String>,
        email: String,
        encrypted_password: String,
        name: Option<String>,
        image: Option<String>,
        roles: RoleSet,
        password_reset: Option<PasswordReset>,
        remember_created_at: Option<DateTime<Utc>>,
        tracking: SignInTracking,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            provider,
            uid,
            email,
            encrypted_password,
            name,
            image,
            roles,
            password_reset,
            remember_created_at,
            tracking,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn provider(&self) -> Option<Provider> {
        self.provider
    }

    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn encrypted_password(&self) -> &str {
        &self.encrypted_password
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    #[must_use]
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    #[must_use]
    pub fn password_reset(&self) -> Option<&PasswordReset> {
        self.password_reset.as_ref()
    }

    #[must_use]
    pub fn remember_created_at(&self) -> Option<DateTime<Utc>> {
        self.remember_created_at
    }

    #[must_use]
    pub fn tracking(&self) -> &SignInTracking {
        &self.tracking
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if the account's `(provider, uid)` equals the given pair.
    ///
    /// Both halves take part in the comparison, so an absent uid only
    /// matches an absent uid of the same provider.
    #[must_use]
    pub fn matches_identity(&self, provider: Provider, uid: Option<&str>) -> bool {
        self.provider == Some(provider) && self.uid.as_deref() == uid
    }

    /// Links the account to a provider identity.
    pub fn set_identity(&mut self, provider: Provider, uid: Option<String>) {
        self.provider = Some(provider);
        self.uid = uid;
        self.touch();
    }

    pub fn set_email(&mut self, email: String) {
        self.email = email;
        self.touch();
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
        self.touch();
    }

    pub fn set_image(&mut self, image: Option<String>) {
        self.image = image;
        self.touch();
    }

    pub fn set_encrypted_password(&mut self, encrypted_password: String) {
        self.encrypted_password = encrypted_password;
        self.touch();
    }

    /// Adds a role. Returns false if the account already held it.
    pub fn add_role(&mut self, role: Role) -> bool {
        let added = self.roles.insert(role);
        if added {
            self.touch();
        }
        added
    }

    /// Records a newly issued reset token digest.
    pub fn start_password_reset(&mut self, token_digest: String, sent_at: DateTime<Utc>) {
        self.password_reset = Some(PasswordReset {
            token_digest,
            sent_at,
        });
        self.touch();
    }

    pub fn clear_password_reset(&mut self) {
        self.password_reset = None;
        self.touch();
    }

    /// Returns true while the pending reset token is younger than `within`.
    #[must_use]
    pub fn reset_period_valid(&self, within: Duration, now: DateTime<Utc>) -> bool {
        self.password_reset
            .as_ref()
            .is_some_and(|reset| reset.sent_at + within > now)
    }

    /// Starts a remembered sign-in unless an unexpired one is active.
    pub fn remember(&mut self, remember_for: Duration, now: DateTime<Utc>) {
        if self.remember_expired(remember_for, now) {
            self.remember_created_at = Some(now);
            self.touch();
        }
    }

    /// Ends every remembered sign-in of the account.
    pub fn forget(&mut self) {
        if self.remember_created_at.take().is_some() {
            self.touch();
        }
    }

    /// Returns true if remembered sign-ins are no longer honored.
    #[must_use]
    pub fn remember_expired(&self, remember_for: Duration, now: DateTime<Utc>) -> bool {
        match self.remember_created_at {
            Some(created) => created + remember_for <= now,
            None => true,
        }
    }

    /// Moves the current sign-in to "last" and records a new one.
    pub fn track_sign_in(&mut self, ip: Option<String>, now: DateTime<Utc>) {
        let tracking = &mut self.tracking;
        tracking.last_sign_in_at = tracking.current_sign_in_at.or(Some(now));
        tracking.current_sign_in_at = Some(now);
        tracking.last_sign_in_ip = tracking.current_sign_in_ip.take().or_else(|| ip.clone());
        tracking.current_sign_in_ip = ip;
        tracking.sign_in_count += 1;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new("a@example.com".to_string(), "$argon2id$stub".to_string())
    }

    #[test]
    fn new_user_has_generated_id_and_no_roles() {
        let user = user();
        assert!(user.id().to_string().starts_with("usr_"));
        assert!(user.roles().is_empty());
        assert!(user.provider().is_none());
        assert!(user.uid().is_none());
        assert_eq!(user.created_at(), user.updated_at());
    }

    #[test]
    fn identity_match_uses_both_halves() {
        let mut user = user();
        user.set_identity(Provider::Kakao, Some("123".to_string()));

        assert!(user.matches_identity(Provider::Kakao, Some("123")));
        assert!(!user.matches_identity(Provider::Naver, Some("123")));
        assert!(!user.matches_identity(Provider::Kakao, Some("456")));
        assert!(!user.matches_identity(Provider::Kakao, None));
    }

    #[test]
    fn absent_uid_only_matches_same_provider() {
        let mut user = user();
        user.set_identity(Provider::Naver, None);

        assert!(user.matches_identity(Provider::Naver, None));
        assert!(!user.matches_identity(Provider::Kakao, None));
    }

    #[test]
    fn registered_user_matches_no_identity() {
        let user = user();
        assert!(!user.matches_identity(Provider::Kakao, None));
    }

    #[test]
    fn add_role_updates_timestamp_once() {
        let mut user = user();
        let before = user.updated_at();
        std::thread::sleep(std::time::Duration::from_millis(1));

        assert!(user.add_role(Role::User));
        let after = user.updated_at();
        assert!(after > before);

        assert!(!user.add_role(Role::User));
        assert_eq!(user.updated_at(), after);
    }

    #[test]
    fn tracking_shifts_current_to_last() {
        let mut user = user();
        let first = Utc::now() - Duration::hours(2);
        let second = Utc::now();

        user.track_sign_in(Some("10.0.0.1".to_string()), first);
        let tracking = user.tracking();
        assert_eq!(tracking.sign_in_count, 1);
        assert_eq!(tracking.current_sign_in_at, Some(first));
        assert_eq!(tracking.last_sign_in_at, Some(first));
        assert_eq!(tracking.last_sign_in_ip.as_deref(), Some("10.0.0.1"));

        user.track_sign_in(Some("10.0.0.2".to_string()), second);
        let tracking = user.tracking();
        assert_eq!(tracking.sign_in_count, 2);
        assert_eq!(tracking.current_sign_in_at, Some(second));
        assert_eq!(tracking.last_sign_in_at, Some(first));
        assert_eq!(tracking.current_sign_in_ip.as_deref(), Some("10.0.0.2"));
        assert_eq!(tracking.last_sign_in_ip.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn reset_period_expires() {
        let mut user = user();
        let now = Utc::now();
        assert!(!user.reset_period_valid(Duration::hours(6), now));

        user.start_password_reset("digest".to_string(), now - Duration::hours(5));
        assert!(user.reset_period_valid(Duration::hours(6), now));
        assert!(!user.reset_period_valid(Duration::hours(6), now + Duration::hours(2)));

        user.clear_password_reset();
        assert!(user.password_reset().is_none());
    }

    #[test]
    fn remember_keeps_first_timestamp() {
        let mut user = user();
        let now = Utc::now();
        assert!(user.remember_expired(Duration::days(14), now));

        user.remember(Duration::days(14), now - Duration::days(1));
        user.remember(Duration::days(14), now);
        assert_eq!(user.remember_created_at(), Some(now - Duration::days(1)));
        assert!(!user.remember_expired(Duration::days(14), now));
        assert!(user.remember_expired(Duration::days(14), now + Duration::days(14)));

        let later = now + Duration::days(20);
        user.remember(Duration::days(14), later);
        assert_eq!(user.remember_created_at(), Some(later));

        user.forget();
        assert!(user.remember_created_at().is_none());
    }

    #[test]
    fn serialization_omits_password_hash() {
        let user = user();
        let json = serde_json::to_value(&user).expect("serialize");
        assert!(json.get("encrypted_password").is_none());
        assert_eq!(json["email"], "a@example.com");
    }
}
