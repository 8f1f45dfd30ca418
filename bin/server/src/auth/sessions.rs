//! Password sign-in and sign-out.

use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use gatehouse_accounts::{AccountError, SessionId};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use super::{AppState, ClientIp, OptionalAuth, SESSION_COOKIE, removal_cookie, start_session};
use crate::error::AuthError;
use crate::views;

/// Sign-in form fields.
#[derive(Debug, Deserialize)]
pub struct SignInForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    /// Checkbox value, present when ticked.
    #[serde(default)]
    remember_me: Option<String>,
}

impl SignInForm {
    fn remember_me(&self) -> bool {
        matches!(self.remember_me.as_deref(), Some("1" | "on" | "true"))
    }
}

/// Shows the sign-in form.
pub async fn new(
    State(state): State<Arc<AppState>>,
    OptionalAuth(current): OptionalAuth,
) -> Result<Response, AuthError> {
    if current.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    Ok(Html(views::sign_in(state.accounts.config(), "", &[])?).into_response())
}

/// Signs in with email and password.
pub async fn create(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    Form(form): Form<SignInForm>,
) -> Result<Response, AuthError> {
    let user = match state.accounts.authenticate(&form.email, &form.password).await {
        Ok(user) => user,
        Err(AccountError::InvalidCredentials) => {
            let page = views::sign_in(
                state.accounts.config(),
                &form.email,
                &["Invalid email or password.".to_string()],
            )?;
            return Ok((StatusCode::UNAUTHORIZED, Html(page)).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let (jar, _user) = start_session(&state, jar, user, ip, form.remember_me()).await?;
    Ok((jar, Redirect::to("/")).into_response())
}

/// Signs out, ending the session and any remembered sign-ins.
pub async fn destroy(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let session_id = SessionId::new(cookie.value().to_string());
        match state.sessions.find(&session_id).await {
            Ok(Some(session)) => {
                if let Err(e) = state.sessions.delete(&session_id).await {
                    warn!(error = %e, "failed to delete session");
                }
                if let Err(e) = state.accounts.forget(session.user_id()).await {
                    warn!(error = %e, "failed to forget remembered sign-ins");
                }
                tracing::info!(user_id = %session.user_id(), "signed out");
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "session lookup failed during sign out"),
        }
    }

    (jar.add(removal_cookie(SESSION_COOKIE)), Redirect::to("/"))
}
