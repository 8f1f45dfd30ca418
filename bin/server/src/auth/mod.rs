//! Authentication for the gatehouse server.
//!
//! This module provides:
//! - Password sign-in and sign-out (`sessions`)
//! - Sign-up and account editing (`registrations`)
//! - Password recovery (`passwords`)
//! - Kakao and Naver sign-in (`omniauth`, `providers`)
//! - Postgres stores and request extractors
//!
//! A signed-in browser holds an opaque session id in the
//! `_gatehouse_session` cookie. The session row decides how long the sign-in
//! lasts; remembered sessions also end when the account forgets them.

pub mod db;
pub mod middleware;
pub mod omniauth;
pub mod passwords;
pub mod providers;
pub mod registrations;
pub mod sessions;

use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Duration as ChronoDuration;
use gatehouse_accounts::{Accounts, Session, SessionId, SessionStore, User};
use time::Duration as TimeDuration;
use tracing::info;

use crate::config::SessionConfig;
use crate::error::AuthError;

pub use middleware::{ClientIp, CurrentUser, OptionalAuth, RequireAuth};
pub use providers::{AuthState, IdentityProvider, OAuthProvider, ProviderError, ProviderRegistry};

/// Session cookie name.
pub const SESSION_COOKIE: &str = "_gatehouse_session";

/// Shared application state.
pub struct AppState {
    /// Account operations.
    pub accounts: Accounts,
    /// Server-side sessions.
    pub sessions: Arc<dyn SessionStore>,
    /// Sign-in providers with client credentials.
    pub providers: ProviderRegistry,
    /// Session configuration.
    pub session_config: SessionConfig,
    /// Public URL of the server.
    pub base_url: String,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        accounts: Accounts,
        sessions: Arc<dyn SessionStore>,
        providers: ProviderRegistry,
        session_config: SessionConfig,
        base_url: String,
    ) -> Self {
        Self {
            accounts,
            sessions,
            providers,
            session_config,
            base_url,
        }
    }

    /// Builds a cookie with the shared security attributes.
    pub(crate) fn cookie(&self, name: &'static str, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(self.session_config.secure_cookies)
            .same_site(SameSite::Lax)
            .build()
    }
}

/// Builds an expired cookie that clears `name`.
pub(crate) fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .max_age(TimeDuration::ZERO)
        .build()
}

/// Records the sign-in, opens a session, and sets its cookie.
///
/// Sessions that are not remembered get a browser-session cookie; the
/// server-side expiry still applies.
pub(crate) async fn start_session(
    state: &AppState,
    jar: CookieJar,
    user: User,
    ip: Option<String>,
    remember_me: bool,
) -> Result<(CookieJar, User), AuthError> {
    let remember = state.accounts.should_remember(remember_me);
    let user = state.accounts.record_sign_in(user, ip, remember).await?;

    let duration = if remember {
        state.accounts.config().remember_for()
    } else {
        ChronoDuration::minutes(state.session_config.duration_minutes)
    };
    let session = Session::new(SessionId::generate(), user.id(), duration, remember);
    state.sessions.create(&session).await?;

    let mut cookie = state.cookie(SESSION_COOKIE, session.id().as_str().to_string());
    if remember {
        cookie.set_max_age(TimeDuration::seconds(duration.num_seconds()));
    }

    info!(user_id = %user.id(), remembered = remember, "signed in");
    Ok((jar.add(cookie), user))
}
