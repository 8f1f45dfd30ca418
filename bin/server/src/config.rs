//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables.
//!
//! See [`AuthConfig`](gatehouse_accounts::AuthConfig) for the
//! authentication capabilities.

use gatehouse_accounts::{AuthConfig, Provider};
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Socket address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Public URL of the server, used for provider redirect URIs and reset
    /// links.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Maximum database connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Enabled authentication capabilities.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Provider application credentials.
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Duration of a sign-in that is not remembered, in minutes.
    #[serde(default = "default_session_duration_minutes")]
    pub duration_minutes: i64,

    /// Interval between session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

/// Credentials registered with each provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub kakao: Option<ProviderCredentials>,
    #[serde(default)]
    pub naver: Option<ProviderCredentials>,
}

impl ProvidersConfig {
    /// Returns the credentials for `provider`, if configured.
    #[must_use]
    pub fn get(&self, provider: Provider) -> Option<&ProviderCredentials> {
        match provider {
            Provider::Kakao => self.kakao.as_ref(),
            Provider::Naver => self.naver.as_ref(),
        }
    }
}

/// An OAuth application registered with a provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCredentials {
    pub client_id: String,

    /// Kakao only requires a secret when the app enables one.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Overrides `{base_url}/users/auth/{provider}/callback`.
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_session_duration_minutes() -> i64 {
    120
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_minutes: default_session_duration_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let source = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Self::from_source(source)
    }

    /// Deserializes and validates an already-built configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is missing, has the wrong type, or is
    /// outside its usable range.
    pub fn from_source(source: config::Config) -> Result<Self, config::ConfigError> {
        let config: Self = source.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.session.duration_minutes <= 0
            || chrono::Duration::try_minutes(self.session.duration_minutes).is_none()
        {
            return Err(config::ConfigError::Message(format!(
                "invalid 'session.duration_minutes': {} is not a usable duration",
                self.session.duration_minutes
            )));
        }
        if self.session.cleanup_interval_seconds == 0 {
            return Err(config::ConfigError::Message(
                "invalid 'session.cleanup_interval_seconds': must be greater than zero"
                    .to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(config::ConfigError::Message(
                "invalid 'max_connections': must be greater than zero".to_string(),
            ));
        }
        self.auth
            .validate()
            .map_err(|e| config::ConfigError::Message(format!("auth: {}", e)))
    }

    /// Callback URL registered for `provider`.
    #[must_use]
    pub fn redirect_uri(&self, provider: Provider) -> String {
        self.providers
            .get(provider)
            .and_then(|credentials| credentials.redirect_uri.clone())
            .unwrap_or_else(|| {
                format!(
                    "{}/users/auth/{}/callback",
                    self.base_url.trim_end_matches('/'),
                    provider
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn try_from_pairs(pairs: &[(&str, &str)]) -> Result<ServerConfig, config::ConfigError> {
        let mut builder = config::Config::builder();
        for (key, value) in pairs {
            builder = builder
                .set_override(*key, *value)
                .expect("override");
        }
        ServerConfig::from_source(builder.build().expect("build"))
    }

    fn from_pairs(pairs: &[(&str, &str)]) -> ServerConfig {
        try_from_pairs(pairs).expect("valid config")
    }

    #[test]
    fn session_config_has_correct_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.duration_minutes, 120);
        assert_eq!(config.cleanup_interval_seconds, 300);
        assert!(config.secure_cookies);
    }

    #[test]
    fn only_database_url_is_required() {
        let config = from_pairs(&[("database_url", "postgres://localhost/gatehouse")]);

        assert_eq!(config.listen_addr, "127.0.0.1:3000");
        assert_eq!(config.max_connections, 5);
        assert!(config.auth.registerable);
        assert!(config.providers.kakao.is_none());
    }

    #[test]
    fn zero_cleanup_interval_is_rejected() {
        let err = try_from_pairs(&[
            ("database_url", "postgres://localhost/gatehouse"),
            ("session.cleanup_interval_seconds", "0"),
        ])
        .expect_err("zero interval");

        assert!(err.to_string().contains("cleanup_interval_seconds"));
    }

    #[test]
    fn out_of_range_auth_durations_are_rejected() {
        let err = try_from_pairs(&[
            ("database_url", "postgres://localhost/gatehouse"),
            ("auth.remember_for_days", "9223372036854775807"),
        ])
        .expect_err("oversized remember period");
        assert!(err.to_string().contains("remember_for_days"));

        let err = try_from_pairs(&[
            ("database_url", "postgres://localhost/gatehouse"),
            ("auth.reset_password_within_hours", "-1"),
        ])
        .expect_err("negative reset window");
        assert!(err.to_string().contains("reset_password_within_hours"));
    }

    #[test]
    fn redirect_uri_defaults_to_callback_route() {
        let config = from_pairs(&[
            ("database_url", "postgres://localhost/gatehouse"),
            ("base_url", "https://gatehouse.example.com/"),
            ("providers.kakao.client_id", "kakao-app"),
            ("providers.naver.client_id", "naver-app"),
            (
                "providers.naver.redirect_uri",
                "https://auth.example.com/naver",
            ),
        ]);

        assert_eq!(
            config.redirect_uri(Provider::Kakao),
            "https://gatehouse.example.com/users/auth/kakao/callback"
        );
        assert_eq!(
            config.redirect_uri(Provider::Naver),
            "https://auth.example.com/naver"
        );
    }
}
