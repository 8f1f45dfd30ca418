//! Error types for server startup and request handling.
//!
//! Startup failures are reported through rootcause as `Report<StartupError>`.
//! Handler failures are [`AuthError`], which renders itself as a response.

use std::fmt;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use gatehouse_accounts::{AccountError, StoreError};

use crate::views::{self, ViewError};

/// Errors that stop the server from starting.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// The database was unreachable.
    Database { details: String },
    /// Migrations failed to apply.
    Migration { details: String },
    /// A provider client could not be built.
    Providers { details: String },
    /// A page template failed to parse.
    Templates { details: String },
    /// The listen address could not be bound.
    Bind { addr: String, details: String },
    /// The server stopped with an error.
    Serve { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "invalid configuration: {}", details),
            Self::Database { details } => write!(f, "database connection failed: {}", details),
            Self::Migration { details } => write!(f, "migrations failed: {}", details),
            Self::Providers { details } => write!(f, "provider setup failed: {}", details),
            Self::Templates { details } => write!(f, "page templates failed to load: {}", details),
            Self::Bind { addr, details } => write!(f, "failed to bind '{}': {}", addr, details),
            Self::Serve { details } => write!(f, "server error: {}", details),
        }
    }
}

impl std::error::Error for StartupError {}

/// Errors returned by request handlers.
#[derive(Debug)]
pub enum AuthError {
    /// The provider callback arrived without the state cookie.
    MissingAuthState,
    /// The state cookie could not be read.
    InvalidAuthState,
    /// The callback `state` did not match the state cookie.
    CsrfMismatch,
    /// The path named a provider that is unknown or not enabled.
    UnknownProvider { name: String },
    /// The submitted data was rejected.
    Rejected { messages: Vec<String> },
    /// The account no longer exists.
    NotFound,
    /// A storage or hashing failure.
    Internal { details: String },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAuthState => write!(f, "missing auth state"),
            Self::InvalidAuthState => write!(f, "invalid auth state"),
            Self::CsrfMismatch => write!(f, "auth state mismatch"),
            Self::UnknownProvider { name } => write!(f, "unknown provider '{}'", name),
            Self::Rejected { messages } => write!(f, "rejected: {}", messages.join(", ")),
            Self::NotFound => write!(f, "account not found"),
            Self::Internal { details } => write!(f, "internal error: {}", details),
        }
    }
}

impl std::error::Error for AuthError {}

/// Messages shown to the user for account errors caused by their input.
///
/// Returns `None` for failures that are not the user's to fix.
pub fn rejection_messages(err: &AccountError) -> Option<Vec<String>> {
    let messages = match err {
        AccountError::Validation(errors) => errors.full_messages(),
        AccountError::InvalidCredentials => vec!["Invalid email or password.".to_string()],
        AccountError::InvalidResetToken => vec!["Reset password token is invalid".to_string()],
        AccountError::ResetTokenExpired => {
            vec!["Reset password token has expired, please request a new one".to_string()]
        }
        AccountError::NotFound | AccountError::PasswordHash { .. } | AccountError::Store(_) => {
            return None;
        }
    };
    Some(messages)
}

impl From<AccountError> for AuthError {
    fn from(err: AccountError) -> Self {
        if let Some(messages) = rejection_messages(&err) {
            return Self::Rejected { messages };
        }
        match err {
            AccountError::NotFound => Self::NotFound,
            other => Self::Internal {
                details: other.to_string(),
            },
        }
    }
}

impl From<ViewError> for AuthError {
    fn from(err: ViewError) -> Self {
        Self::Internal {
            details: err.to_string(),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AccountError::from(err).into()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, title, messages) = match self {
            Self::MissingAuthState => (
                StatusCode::BAD_REQUEST,
                "Sign in failed",
                vec!["Your sign-in attempt expired. Please try again.".to_string()],
            ),
            Self::InvalidAuthState | Self::CsrfMismatch => (
                StatusCode::BAD_REQUEST,
                "Sign in failed",
                vec!["Could not verify the sign-in request.".to_string()],
            ),
            Self::UnknownProvider { .. } => (
                StatusCode::NOT_FOUND,
                "Not found",
                vec!["This sign-in method is not available.".to_string()],
            ),
            Self::Rejected { messages } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "Request rejected", messages)
            }
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                "Not found",
                vec!["Account not found.".to_string()],
            ),
            Self::Internal { details } => {
                tracing::error!(details = %details, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong",
                    vec!["Internal server error".to_string()],
                )
            }
        };

        match views::error_page(title, &messages) {
            Ok(page) => (status, Html(page)).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "failed to render error page");
                (status, title).into_response()
            }
        }
    }
}
