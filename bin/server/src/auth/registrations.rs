//! Sign-up and account editing.

use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use gatehouse_accounts::{AccountError, AccountUpdate, Registration};
use std::sync::Arc;

use super::{AppState, ClientIp, OptionalAuth, RequireAuth, start_session};
use crate::error::AuthError;
use crate::views;

/// Shows the sign-up form.
pub async fn new(
    State(state): State<Arc<AppState>>,
    OptionalAuth(current): OptionalAuth,
) -> Result<Response, AuthError> {
    if current.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    Ok(Html(views::sign_up(state.accounts.config(), "", "", &[])?).into_response())
}

/// Creates an account, gives it the default role, and signs it in.
pub async fn create(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    Form(form): Form<Registration>,
) -> Result<Response, AuthError> {
    let email = form.email.clone();
    let name = form.name.clone().unwrap_or_default();

    let user = match state.accounts.register(form).await {
        Ok(user) => user,
        Err(AccountError::Validation(errors)) => {
            let page = views::sign_up(
                state.accounts.config(),
                &email,
                &name,
                &errors.full_messages(),
            )?;
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(page)).into_response());
        }
        Err(e) => return Err(e.into()),
    };
    let user = state.accounts.ensure_default_role(user).await?;

    let (jar, _user) = start_session(&state, jar, user, ip, false).await?;
    Ok((jar, Redirect::to("/")).into_response())
}

/// Shows the account edit form.
pub async fn edit(RequireAuth(current): RequireAuth) -> Result<Html<String>, AuthError> {
    Ok(Html(views::edit_account(&current.user, &[])?))
}

/// Applies an account edit.
pub async fn update(
    State(state): State<Arc<AppState>>,
    RequireAuth(current): RequireAuth,
    Form(form): Form<AccountUpdate>,
) -> Result<Response, AuthError> {
    match state.accounts.update_account(current.user.id(), form).await {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(AccountError::Validation(errors)) => {
            let page = views::edit_account(&current.user, &errors.full_messages())?;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(page)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}
