//! Error types for the accounts crate.
//!
//! - `StoreError`: failures reported by a `UserStore` or `SessionStore`
//! - `ValidationErrors`: field-level rejections of a user record
//! - `AccountError`: what account operations return to their callers

use std::fmt;

/// Errors reported by storage backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Another account already uses this email address.
    EmailTaken,
    /// The record to update does not exist.
    NotFound,
    /// The backend failed (connection, query, decoding).
    Backend { details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmailTaken => write!(f, "email address is already in use"),
            Self::NotFound => write!(f, "record not found"),
            Self::Backend { details } => write!(f, "storage backend error: {details}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Attribute name, e.g. `email`.
    pub field: &'static str,
    /// Message without the attribute name, e.g. `can't be blank`.
    pub message: String,
}

impl FieldError {
    /// Creates a field error.
    #[must_use]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = self.field.replace('_', " ");
        let mut chars = field.chars();
        match chars.next() {
            Some(first) => write!(
                f,
                "{}{} {}",
                first.to_uppercase(),
                chars.as_str(),
                self.message
            ),
            None => write!(f, "{}", self.message),
        }
    }
}

/// All field errors found while validating a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Creates an empty set of errors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set holding one error.
    #[must_use]
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Records an error on a field.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Returns true if no errors were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the recorded errors.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns true if any error was recorded on `field`.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Human-readable messages, one per error.
    #[must_use]
    pub fn full_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Converts into a `Result`, failing when any error was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_messages().join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Errors returned by account operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    /// The record failed validation and was not persisted.
    Validation(ValidationErrors),
    /// Email or password did not match an account.
    InvalidCredentials,
    /// No account holds this reset token.
    InvalidResetToken,
    /// The reset token is older than the configured window.
    ResetTokenExpired,
    /// The account does not exist.
    NotFound,
    /// Hashing a password failed.
    PasswordHash { reason: String },
    /// The store failed.
    Store(StoreError),
}

impl fmt::Display for AccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(errors) => write!(f, "validation failed: {errors}"),
            Self::InvalidCredentials => write!(f, "invalid email or password"),
            Self::InvalidResetToken => write!(f, "reset password token is invalid"),
            Self::ResetTokenExpired => {
                write!(f, "reset password token has expired, please request a new one")
            }
            Self::NotFound => write!(f, "account not found"),
            Self::PasswordHash { reason } => write!(f, "failed to hash password: {reason}"),
            Self::Store(err) => write!(f, "account store error: {err}"),
        }
    }
}

impl std::error::Error for AccountError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(errors) => Some(errors),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationErrors> for AccountError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EmailTaken => {
                Self::Validation(ValidationErrors::single("email", "has already been taken"))
            }
            StoreError::NotFound => Self::NotFound,
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_error_display_capitalizes_attribute() {
        let err = FieldError::new("password_confirmation", "doesn't match Password");
        assert_eq!(err.to_string(), "Password confirmation doesn't match Password");
    }

    #[test]
    fn validation_errors_join_messages() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "can't be blank");
        errors.add("password", "is too short (minimum is 6 characters)");

        assert!(errors.has("email"));
        assert!(!errors.has("name"));
        assert_eq!(
            errors.to_string(),
            "Email can't be blank, Password is too short (minimum is 6 characters)"
        );
    }

    #[test]
    fn empty_validation_errors_are_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn email_taken_becomes_validation_error() {
        let err = AccountError::from(StoreError::EmailTaken);
        match err {
            AccountError::Validation(errors) => {
                assert_eq!(errors.full_messages(), vec!["Email has already been taken"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn backend_error_is_kept() {
        let err = AccountError::from(StoreError::Backend {
            details: "connection reset".to_string(),
        });
        assert!(err.to_string().contains("connection reset"));
    }
}
