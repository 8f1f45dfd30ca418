//! Postgres stores for users and sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatehouse_accounts::{
    Inserted, PasswordReset, Provider, RoleSet, Session, SessionId, SessionStore,
    SignInTracking, StoreError, User, UserStore,
};
use gatehouse_core::UserId;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::instrument;

/// Unique index guarding account emails.
const EMAIL_INDEX: &str = "index_users_on_email";

const USER_COLUMNS: &str = r#"
    id, provider, uid, email, encrypted_password, name, image, roles,
    reset_password_token, reset_password_sent_at, remember_created_at,
    sign_in_count, current_sign_in_at, last_sign_in_at,
    current_sign_in_ip, last_sign_in_ip, created_at, updated_at
"#;

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    id: String,
    provider: Option<String>,
    uid: Option<String>,
    email: String,
    encrypted_password: String,
    name: Option<String>,
    image: Option<String>,
    roles: serde_json::Value,
    reset_password_token: Option<String>,
    reset_password_sent_at: Option<DateTime<Utc>>,
    remember_created_at: Option<DateTime<Utc>>,
    sign_in_count: i32,
    current_sign_in_at: Option<DateTime<Utc>>,
    last_sign_in_at: Option<DateTime<Utc>>,
    current_sign_in_ip: Option<String>,
    last_sign_in_ip: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, StoreError> {
        let id = UserId::from_str(&self.id).map_err(|e| StoreError::Backend {
            details: format!("invalid user id '{}': {}", self.id, e),
        })?;
        let provider = self
            .provider
            .as_deref()
            .map(Provider::from_str)
            .transpose()
            .map_err(|e| StoreError::Backend {
                details: format!("user '{}': {}", self.id, e),
            })?;
        let roles: RoleSet = serde_json::from_value(self.roles).map_err(|e| StoreError::Backend {
            details: format!("invalid roles for user '{}': {}", self.id, e),
        })?;
        let password_reset = match (self.reset_password_token, self.reset_password_sent_at) {
            (Some(token_digest), Some(sent_at)) => Some(PasswordReset {
                token_digest,
                sent_at,
            }),
            _ => None,
        };

        Ok(User::with_all_fields(
            id,
            provider,
            self.uid,
            self.email,
            self.encrypted_password,
            self.name,
            self.image,
            roles,
            password_reset,
            self.remember_created_at,
            SignInTracking {
                sign_in_count: self.sign_in_count,
                current_sign_in_at: self.current_sign_in_at,
                last_sign_in_at: self.last_sign_in_at,
                current_sign_in_ip: self.current_sign_in_ip,
                last_sign_in_ip: self.last_sign_in_ip,
            },
            self.created_at,
            self.updated_at,
        ))
    }
}

/// Row type for session queries.
#[derive(FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    remembered: bool,
}

impl SessionRow {
    fn try_into_session(self) -> Result<Session, StoreError> {
        let user_id = UserId::from_str(&self.user_id).map_err(|e| StoreError::Backend {
            details: format!("invalid user id '{}': {}", self.user_id, e),
        })?;
        Ok(Session::with_all_fields(
            SessionId::new(self.id),
            user_id,
            self.created_at,
            self.expires_at,
            self.remembered,
        ))
    }
}

/// Maps a database error, recognizing email collisions.
fn store_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_unique_violation()
        && db_err.constraint() == Some(EMAIL_INDEX)
    {
        return StoreError::EmailTaken;
    }
    StoreError::Backend {
        details: err.to_string(),
    }
}

fn roles_json(user: &User) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(user.roles()).map_err(|e| StoreError::Backend {
        details: format!("failed to serialize roles: {}", e),
    })
}

/// Postgres [`UserStore`].
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Creates a new user store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, filter: &str, value: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {filter}");
        let row: Option<UserRow> = sqlx::query_as(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        row.map(UserRow::try_into_user).transpose()
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.find_one("id = $1", &id.to_string()).await
    }

    #[instrument(skip(self))]
    async fn find_by_provider_uid(
        &self,
        provider: Provider,
        uid: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE provider = $1 AND uid IS NOT DISTINCT FROM $2"
        );
        let row: Option<UserRow> = sqlx::query_as(&query)
            .bind(provider.as_str())
            .bind(uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        row.map(UserRow::try_into_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one("email = $1", email).await
    }

    async fn find_by_reset_token(&self, token_digest: &str) -> Result<Option<User>, StoreError> {
        self.find_one("reset_password_token = $1", token_digest).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.id()))]
    async fn insert(&self, user: &User) -> Result<Inserted, StoreError> {
        let reset = user.password_reset();
        let tracking = user.tracking();

        // Only the provider identity index is named as the conflict target,
        // so an email collision still raises a unique violation.
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                id, provider, uid, email, encrypted_password, name, image, roles,
                reset_password_token, reset_password_sent_at, remember_created_at,
                sign_in_count, current_sign_in_at, last_sign_in_at,
                current_sign_in_ip, last_sign_in_ip, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (provider, uid) WHERE provider IS NOT NULL DO NOTHING
            "#,
        )
        .bind(user.id().to_string())
        .bind(user.provider().map(|p| p.as_str()))
        .bind(user.uid())
        .bind(user.email())
        .bind(user.encrypted_password())
        .bind(user.name())
        .bind(user.image())
        .bind(roles_json(user)?)
        .bind(reset.map(|r| r.token_digest.as_str()))
        .bind(reset.map(|r| r.sent_at))
        .bind(user.remember_created_at())
        .bind(tracking.sign_in_count)
        .bind(tracking.current_sign_in_at)
        .bind(tracking.last_sign_in_at)
        .bind(tracking.current_sign_in_ip.as_deref())
        .bind(tracking.last_sign_in_ip.as_deref())
        .bind(user.created_at())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            Ok(Inserted::ProviderConflict)
        } else {
            Ok(Inserted::Created)
        }
    }

    #[instrument(skip(self, user), fields(user_id = %user.id()))]
    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let reset = user.password_reset();
        let tracking = user.tracking();

        let result = sqlx::query(
            r#"
            UPDATE users
            SET provider = $2, uid = $3, email = $4, encrypted_password = $5,
                name = $6, image = $7, roles = $8,
                reset_password_token = $9, reset_password_sent_at = $10,
                remember_created_at = $11, sign_in_count = $12,
                current_sign_in_at = $13, last_sign_in_at = $14,
                current_sign_in_ip = $15, last_sign_in_ip = $16, updated_at = $17
            WHERE id = $1
            "#,
        )
        .bind(user.id().to_string())
        .bind(user.provider().map(|p| p.as_str()))
        .bind(user.uid())
        .bind(user.email())
        .bind(user.encrypted_password())
        .bind(user.name())
        .bind(user.image())
        .bind(roles_json(user)?)
        .bind(reset.map(|r| r.token_digest.as_str()))
        .bind(reset.map(|r| r.sent_at))
        .bind(user.remember_created_at())
        .bind(tracking.sign_in_count)
        .bind(tracking.current_sign_in_at)
        .bind(tracking.last_sign_in_at)
        .bind(tracking.current_sign_in_ip.as_deref())
        .bind(tracking.last_sign_in_ip.as_deref())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Postgres [`SessionStore`].
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Creates a new session store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, session: &Session) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, created_at, expires_at, remembered)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(session.id().as_str())
        .bind(session.user_id().to_string())
        .bind(session.created_at())
        .bind(session.expires_at())
        .bind(session.remembered())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn find(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, created_at, expires_at, remembered
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(SessionRow::try_into_session).transpose()
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(())
    }

    async fn delete_for_user(&self, user_id: UserId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(result.rows_affected())
    }
}
