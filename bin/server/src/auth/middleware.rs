//! Authentication extractors for Axum.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use gatehouse_accounts::{Session, SessionId, User};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{AppState, SESSION_COOKIE};

/// A signed-in user and the session that authenticated the request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session: Session,
}

/// Extractor for requiring a signed-in user.
///
/// If the user is not signed in, they are redirected to the sign-in page.
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        let session_cookie = jar
            .get(SESSION_COOKIE)
            .ok_or(AuthRejection::NotAuthenticated)?;
        let session_id = SessionId::new(session_cookie.value().to_string());

        let session = app_state
            .sessions
            .find(&session_id)
            .await
            .map_err(|e| {
                warn!(error = %e, "session lookup failed");
                AuthRejection::InternalError
            })?
            .ok_or(AuthRejection::NotAuthenticated)?;

        let user = app_state
            .accounts
            .find(session.user_id())
            .await
            .map_err(|e| {
                warn!(error = %e, "user lookup failed");
                AuthRejection::InternalError
            })?
            .ok_or(AuthRejection::NotAuthenticated)?;

        if !app_state.accounts.session_valid(&user, &session) {
            debug!(user_id = %user.id(), "session no longer valid");
            if let Err(e) = app_state.sessions.delete(&session_id).await {
                warn!(error = %e, "failed to delete invalid session");
            }
            return Err(AuthRejection::SessionExpired);
        }

        Ok(RequireAuth(CurrentUser { user, session }))
    }
}

/// Extractor for optionally getting the signed-in user.
///
/// Returns None if the user is not signed in.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match RequireAuth::from_request_parts(parts, state).await {
            Ok(RequireAuth(current)) => Ok(OptionalAuth(Some(current))),
            Err(_) => Ok(OptionalAuth(None)),
        }
    }
}

/// Extractor for the client address recorded on sign-in.
///
/// Uses the first `X-Forwarded-For` entry, then `X-Real-IP`.
pub struct ClientIp(pub Option<String>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(&parts.headers)))
    }
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        })
        .map(ToString::to_string)
}

/// Rejection type for authentication extractors.
#[derive(Debug)]
pub enum AuthRejection {
    NotAuthenticated,
    SessionExpired,
    InternalError,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated | Self::SessionExpired => {
                Redirect::to("/users/sign_in").into_response()
            }
            Self::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_ip_prefers_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));

        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));

        assert_eq!(client_ip(&headers).as_deref(), Some("198.51.100.4"));
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }
}
