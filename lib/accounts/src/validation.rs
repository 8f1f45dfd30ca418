//! Field validation for account records.

use crate::config::AuthConfig;
use crate::error::ValidationErrors;

/// Trims and lowercases an email address for storage and lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Returns true for `local@domain` with no whitespace and exactly one `@`.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
}

/// Records problems with an (already normalized) email.
pub fn check_email(email: &str, errors: &mut ValidationErrors) {
    if email.is_empty() {
        errors.add("email", "can't be blank");
    } else if !is_valid_email(email) {
        errors.add("email", "is invalid");
    }
}

/// Records problems with a new password and its optional confirmation.
pub fn check_password(
    password: &str,
    confirmation: Option<&str>,
    config: &AuthConfig,
    errors: &mut ValidationErrors,
) {
    let length = password.chars().count();
    if password.is_empty() {
        errors.add("password", "can't be blank");
    } else if length < config.password_min_length {
        errors.add(
            "password",
            format!(
                "is too short (minimum is {} characters)",
                config.password_min_length
            ),
        );
    } else if length > config.password_max_length {
        errors.add(
            "password",
            format!(
                "is too long (maximum is {} characters)",
                config.password_max_length
            ),
        );
    }

    if let Some(confirmation) = confirmation
        && confirmation != password
    {
        errors.add("password_confirmation", "doesn't match Password");
    }
}

/// Validates a new account's email and password.
///
/// Does nothing when validation is disabled.
pub fn validate_new_account(
    email: &str,
    password: &str,
    confirmation: Option<&str>,
    config: &AuthConfig,
) -> Result<(), ValidationErrors> {
    if !config.validatable {
        return Ok(());
    }
    let mut errors = ValidationErrors::new();
    check_email(email, &mut errors);
    check_password(password, confirmation, config, &mut errors);
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@example.com"));
        assert!(is_valid_email("a@b"));
        assert!(!is_valid_email("example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@"));
        assert!(!is_valid_email("a@b@c"));
        assert!(!is_valid_email("a b@example.com"));
    }

    #[test]
    fn blank_email_and_short_password() {
        let err = validate_new_account("", "abc", None, &AuthConfig::default()).unwrap_err();
        assert_eq!(
            err.full_messages(),
            vec![
                "Email can't be blank",
                "Password is too short (minimum is 6 characters)"
            ]
        );
    }

    #[test]
    fn long_password_is_rejected() {
        let password = "x".repeat(129);
        let err =
            validate_new_account("a@example.com", &password, None, &AuthConfig::default())
                .unwrap_err();
        assert!(err.has("password"));
    }

    #[test]
    fn confirmation_must_match() {
        let err = validate_new_account(
            "a@example.com",
            "secret123",
            Some("secret124"),
            &AuthConfig::default(),
        )
        .unwrap_err();
        assert!(err.has("password_confirmation"));
    }

    #[test]
    fn valid_account_passes() {
        assert!(
            validate_new_account(
                "a@example.com",
                "secret123",
                Some("secret123"),
                &AuthConfig::default()
            )
            .is_ok()
        );
    }

    #[test]
    fn disabled_validation_accepts_anything() {
        let config = AuthConfig {
            validatable: false,
            ..AuthConfig::default()
        };
        assert!(validate_new_account("", "", None, &config).is_ok());
    }
}
