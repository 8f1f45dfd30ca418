//! Password recovery.
//!
//! Requests for unknown emails get the same answer as known ones. No mail
//! is sent; the reset link is written to the debug log.

use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::{AppState, ClientIp, start_session};
use crate::error::{AuthError, rejection_messages};
use crate::views;

const SENT_NOTICE: &str = "If your email address exists in our database, you will receive a \
     password recovery link at your email address in a few minutes.";

/// Reset request form.
#[derive(Debug, Deserialize)]
pub struct ResetRequestForm {
    #[serde(default)]
    email: String,
}

/// Query of the link in the reset instructions.
#[derive(Debug, Deserialize)]
pub struct ResetLinkQuery {
    reset_password_token: Option<String>,
}

/// New password form.
#[derive(Debug, Deserialize)]
pub struct ResetForm {
    #[serde(default)]
    reset_password_token: String,
    #[serde(default)]
    password: String,
    password_confirmation: Option<String>,
}

/// Shows the reset request form.
pub async fn new(State(state): State<Arc<AppState>>) -> Result<Html<String>, AuthError> {
    Ok(Html(views::forgot_password(state.accounts.config(), &[])?))
}

/// Issues a reset token for the submitted email.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ResetRequestForm>,
) -> Result<Html<String>, AuthError> {
    if let Some(token) = state
        .accounts
        .send_reset_password_instructions(&form.email)
        .await?
    {
        let link = format!(
            "{}/users/password/edit?reset_password_token={}",
            state.base_url.trim_end_matches('/'),
            token
        );
        info!("reset password instructions issued");
        debug!(link = %link, "reset password link");
    }

    Ok(Html(views::forgot_password(
        state.accounts.config(),
        &[SENT_NOTICE.to_string()],
    )?))
}

/// Shows the new password form for a reset link.
pub async fn edit(Query(query): Query<ResetLinkQuery>) -> Result<Response, AuthError> {
    match query.reset_password_token.filter(|t| !t.is_empty()) {
        Some(token) => Ok(Html(views::reset_password(&token, &[])?).into_response()),
        None => Ok(Redirect::to("/users/sign_in").into_response()),
    }
}

/// Sets the new password and signs the account in.
///
/// Every other session of the account ends.
pub async fn update(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    Form(form): Form<ResetForm>,
) -> Result<Response, AuthError> {
    let result = state
        .accounts
        .reset_password_by_token(
            &form.reset_password_token,
            &form.password,
            form.password_confirmation.as_deref(),
        )
        .await;

    let user = match result {
        Ok(user) => user,
        Err(e) => {
            let Some(messages) = rejection_messages(&e) else {
                return Err(e.into());
            };
            let page = views::reset_password(&form.reset_password_token, &messages)?;
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(page)).into_response());
        }
    };

    let ended = state.sessions.delete_for_user(user.id()).await?;
    debug!(user_id = %user.id(), ended, "ended sessions after password reset");

    let (jar, _user) = start_session(&state, jar, user, ip, false).await?;
    Ok((jar, Redirect::to("/")).into_response())
}
