//! Provider sign-in routes.
//!
//! - `GET|POST /users/auth/{provider}` redirects to the provider
//! - `GET /users/auth/{provider}/callback` signs the returning user in
//! - `GET /users/auth/failure` explains a failed attempt

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use gatehouse_accounts::{AccountError, Provider};
use serde::Deserialize;
use std::sync::Arc;
use time::Duration as TimeDuration;
use tracing::{info, warn};

use super::{AppState, AuthState, ClientIp, IdentityProvider, removal_cookie, start_session};
use crate::error::AuthError;
use crate::views;

/// Auth state cookie name (for CSRF protection during the provider flow).
pub const AUTH_STATE_COOKIE: &str = "omniauth_state";

/// Query parameters of a provider callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Query parameters of the failure page.
#[derive(Debug, Deserialize)]
pub struct FailureQuery {
    message: Option<String>,
    strategy: Option<String>,
}

fn enabled_provider(
    state: &AppState,
    name: &str,
) -> Result<(Provider, Arc<dyn IdentityProvider>), AuthError> {
    let unknown = || AuthError::UnknownProvider {
        name: name.to_string(),
    };
    let provider: Provider = name.parse().map_err(|_| unknown())?;
    if !state.accounts.config().provider_enabled(provider) {
        return Err(unknown());
    }
    let client = state.providers.get(provider).ok_or_else(unknown)?;
    Ok((provider, client))
}

fn failure_redirect(provider: Provider, message: &str) -> Redirect {
    Redirect::to(&format!(
        "/users/auth/failure?message={}&strategy={}",
        message, provider
    ))
}

/// Redirects to the provider's consent page.
pub async fn passthru(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    let (_, client) = enabled_provider(&state, &name)?;
    let (auth_url, auth_state) = client.authorization_url();

    let auth_state_json = serde_json::to_string(&auth_state).map_err(|e| AuthError::Internal {
        details: format!("failed to serialize auth state: {}", e),
    })?;
    let mut cookie = state.cookie(AUTH_STATE_COOKIE, auth_state_json);
    cookie.set_max_age(TimeDuration::minutes(10));

    Ok((jar.add(cookie), Redirect::to(&auth_url)))
}

/// Handles the provider callback.
///
/// Resolves the identity with `find_for_oauth`, assigns the default role,
/// and signs the account in.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<CallbackQuery>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
) -> Result<Response, AuthError> {
    let (provider, client) = enabled_provider(&state, &name)?;

    if let Some(error) = query.error.as_deref() {
        info!(
            provider = %provider,
            error,
            description = query.error_description.as_deref().unwrap_or_default(),
            "provider denied sign in"
        );
        let jar = jar.add(removal_cookie(AUTH_STATE_COOKIE));
        return Ok((jar, failure_redirect(provider, "access_denied")).into_response());
    }

    let auth_state_cookie = jar
        .get(AUTH_STATE_COOKIE)
        .ok_or(AuthError::MissingAuthState)?;
    let auth_state: AuthState = serde_json::from_str(auth_state_cookie.value())
        .map_err(|_| AuthError::InvalidAuthState)?;
    let returned = query.state.as_deref().unwrap_or_default();
    if auth_state.provider != provider || returned.is_empty() || returned != auth_state.csrf_token
    {
        return Err(AuthError::CsrfMismatch);
    }
    let jar = jar.add(removal_cookie(AUTH_STATE_COOKIE));

    let Some(code) = query.code.as_deref().filter(|code| !code.is_empty()) else {
        return Ok((jar, failure_redirect(provider, "invalid_credentials")).into_response());
    };

    let payload = match client.fetch_identity(code, &auth_state).await {
        Ok(payload) => payload,
        Err(report) => {
            warn!(provider = %provider, error = %report, "provider sign in failed");
            return Ok((jar, failure_redirect(provider, "invalid_credentials")).into_response());
        }
    };

    let user = match state.accounts.find_for_oauth(&payload).await {
        Ok(user) => user,
        Err(AccountError::Validation(errors)) => {
            info!(provider = %provider, errors = %errors, "provider account rejected");
            let mut messages = errors.full_messages();
            messages.insert(
                0,
                format!("Could not create an account from your {} sign in.", provider),
            );
            let page = views::error_page("Sign in failed", &messages)?;
            return Ok((jar, (StatusCode::UNPROCESSABLE_ENTITY, Html(page))).into_response());
        }
        Err(e) => return Err(e.into()),
    };
    let user = state.accounts.ensure_default_role(user).await?;

    let (jar, _user) = start_session(&state, jar, user, ip, false).await?;
    Ok((jar, Redirect::to("/")).into_response())
}

/// Explains a failed provider sign-in.
pub async fn failure(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FailureQuery>,
) -> Result<impl IntoResponse, AuthError> {
    let reason = match query.message.as_deref() {
        Some("access_denied") => "access was denied",
        _ => "the credentials were invalid",
    };
    let page = views::provider_failure(
        state.accounts.config(),
        query.strategy.as_deref(),
        reason,
    )?;
    Ok((StatusCode::UNAUTHORIZED, Html(page)))
}
