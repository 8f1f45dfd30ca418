//! Authentication capability configuration.
//!
//! Each flag switches one capability on or off. Everything is enabled by
//! default, with `kakao` and `naver` as sign-in providers.

use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::provider::Provider;

/// Which authentication capabilities are active, and their tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Email and password sign-in.
    #[serde(default = "enabled")]
    pub database_authenticatable: bool,
    /// Self-service sign-up and account editing.
    #[serde(default = "enabled")]
    pub registerable: bool,
    /// Password reset by emailed token.
    #[serde(default = "enabled")]
    pub recoverable: bool,
    /// Long-lived "remember me" sessions.
    #[serde(default = "enabled")]
    pub rememberable: bool,
    /// Sign-in counts, timestamps, and IP addresses.
    #[serde(default = "enabled")]
    pub trackable: bool,
    /// Email and password validation on save.
    #[serde(default = "enabled")]
    pub validatable: bool,
    /// Sign-in through external identity providers.
    #[serde(default = "enabled")]
    pub omniauthable: bool,
    /// Enabled providers as a comma-separated string.
    /// Default: "kakao,naver"
    ///
    /// Read it through [`AuthConfig::omniauth_providers()`], which skips
    /// unknown names and honors `omniauthable`.
    #[serde(default = "default_omniauth_providers")]
    pub omniauth_providers: String,
    /// Minimum password length.
    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,
    /// Maximum password length.
    #[serde(default = "default_password_max_length")]
    pub password_max_length: usize,
    /// How long a reset token stays usable, in hours.
    #[serde(default = "default_reset_password_within_hours")]
    pub reset_password_within_hours: i64,
    /// How long a remembered sign-in lasts, in days.
    #[serde(default = "default_remember_for_days")]
    pub remember_for_days: i64,
}

fn enabled() -> bool {
    true
}

fn default_omniauth_providers() -> String {
    "kakao,naver".to_string()
}

fn default_password_min_length() -> usize {
    6
}

fn default_password_max_length() -> usize {
    128
}

fn default_reset_password_within_hours() -> i64 {
    6
}

fn default_remember_for_days() -> i64 {
    14
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            database_authenticatable: true,
            registerable: true,
            recoverable: true,
            rememberable: true,
            trackable: true,
            validatable: true,
            omniauthable: true,
            omniauth_providers: default_omniauth_providers(),
            password_min_length: default_password_min_length(),
            password_max_length: default_password_max_length(),
            reset_password_within_hours: default_reset_password_within_hours(),
            remember_for_days: default_remember_for_days(),
        }
    }
}

/// A tunable that [`AuthConfig::validate`] rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSetting {
    pub setting: &'static str,
    pub reason: String,
}

impl fmt::Display for InvalidSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid '{}': {}", self.setting, self.reason)
    }
}

impl std::error::Error for InvalidSetting {}

fn positive_within(
    setting: &'static str,
    value: i64,
    to_duration: fn(i64) -> Option<Duration>,
) -> Result<(), InvalidSetting> {
    if value <= 0 {
        return Err(InvalidSetting {
            setting,
            reason: format!("must be greater than zero, got {}", value),
        });
    }
    if to_duration(value).is_none() {
        return Err(InvalidSetting {
            setting,
            reason: format!("{} is out of range", value),
        });
    }
    Ok(())
}

impl AuthConfig {
    /// Checks the tunables before the config is used.
    ///
    /// # Errors
    ///
    /// Returns the first setting that is zero, negative, too large to be
    /// a duration, or inconsistent with another setting.
    pub fn validate(&self) -> Result<(), InvalidSetting> {
        positive_within(
            "reset_password_within_hours",
            self.reset_password_within_hours,
            Duration::try_hours,
        )?;
        positive_within("remember_for_days", self.remember_for_days, Duration::try_days)?;
        if self.password_min_length == 0 {
            return Err(InvalidSetting {
                setting: "password_min_length",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.password_min_length > self.password_max_length {
            return Err(InvalidSetting {
                setting: "password_max_length",
                reason: format!(
                    "{} is below password_min_length {}",
                    self.password_max_length, self.password_min_length
                ),
            });
        }
        Ok(())
    }

    /// Returns the enabled providers, or none when provider sign-in is off.
    ///
    /// Unknown names are skipped with a warning.
    #[must_use]
    pub fn omniauth_providers(&self) -> Vec<Provider> {
        if !self.omniauthable {
            return Vec::new();
        }

        let mut providers = Vec::new();
        for name in self.omniauth_providers.split(',').map(str::trim) {
            if name.is_empty() {
                continue;
            }
            match name.parse::<Provider>() {
                Ok(provider) if !providers.contains(&provider) => providers.push(provider),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "ignoring configured provider"),
            }
        }
        providers
    }

    /// Replaces the enabled providers.
    #[must_use]
    pub fn with_omniauth_providers(mut self, providers: &[Provider]) -> Self {
        self.omniauth_providers = providers
            .iter()
            .map(Provider::as_str)
            .collect::<Vec<_>>()
            .join(",");
        self
    }

    /// Returns true if `provider` may be used to sign in.
    #[must_use]
    pub fn provider_enabled(&self, provider: Provider) -> bool {
        self.omniauth_providers().contains(&provider)
    }

    /// Returns how long a reset token stays usable.
    ///
    /// Assumes [`AuthConfig::validate`] passed.
    #[must_use]
    pub fn reset_password_within(&self) -> Duration {
        Duration::hours(self.reset_password_within_hours)
    }

    /// Returns how long a remembered sign-in lasts.
    ///
    /// Assumes [`AuthConfig::validate`] passed.
    #[must_use]
    pub fn remember_for(&self) -> Duration {
        Duration::days(self.remember_for_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_everything() {
        let config = AuthConfig::default();
        assert!(config.database_authenticatable);
        assert!(config.registerable);
        assert!(config.recoverable);
        assert!(config.rememberable);
        assert!(config.trackable);
        assert!(config.validatable);
        assert!(config.omniauthable);
        assert_eq!(config.omniauth_providers(), vec![Provider::Kakao, Provider::Naver]);
        assert_eq!(config.password_min_length, 6);
        assert_eq!(config.password_max_length, 128);
        assert_eq!(config.reset_password_within(), Duration::hours(6));
        assert_eq!(config.remember_for(), Duration::days(14));
    }

    #[test]
    fn unknown_and_duplicate_providers_are_skipped() {
        let config: AuthConfig =
            serde_json::from_str(r#"{"omniauth_providers":"naver, github,naver"}"#)
                .expect("deserialize");
        assert_eq!(config.omniauth_providers(), vec![Provider::Naver]);
    }

    #[test]
    fn disabling_omniauth_disables_every_provider() {
        let config = AuthConfig {
            omniauthable: false,
            ..AuthConfig::default()
        };
        assert!(config.omniauth_providers().is_empty());
        assert!(!config.provider_enabled(Provider::Kakao));
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(AuthConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_and_oversized_durations_are_rejected() {
        let zero = AuthConfig {
            reset_password_within_hours: 0,
            ..AuthConfig::default()
        };
        let err = zero.validate().expect_err("zero reset window");
        assert_eq!(err.setting, "reset_password_within_hours");

        let huge = AuthConfig {
            remember_for_days: i64::MAX,
            ..AuthConfig::default()
        };
        let err = huge.validate().expect_err("oversized remember period");
        assert_eq!(err.setting, "remember_for_days");
    }

    #[test]
    fn password_lengths_must_be_ordered() {
        let config = AuthConfig {
            password_min_length: 20,
            password_max_length: 10,
            ..AuthConfig::default()
        };
        let err = config.validate().expect_err("min above max");
        assert_eq!(err.setting, "password_max_length");
    }

    #[test]
    fn with_omniauth_providers_replaces_list() {
        let config = AuthConfig::default().with_omniauth_providers(&[Provider::Kakao]);
        assert!(config.provider_enabled(Provider::Kakao));
        assert!(!config.provider_enabled(Provider::Naver));
    }
}
