//! Landing page.

use axum::{extract::State, response::Html};
use std::sync::Arc;

use crate::auth::{AppState, OptionalAuth};
use crate::error::AuthError;
use crate::views;

/// Serves the landing page at `/` and `/home/index`.
pub async fn index(
    State(state): State<Arc<AppState>>,
    OptionalAuth(current): OptionalAuth,
) -> Result<Html<String>, AuthError> {
    let user = current.as_ref().map(|current| &current.user);
    Ok(Html(views::landing(user, state.accounts.config())?))
}
