//! External identity providers and the payload they hand back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity provider an account can sign in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Kakao,
    Naver,
}

impl Provider {
    /// Every supported provider.
    pub const ALL: [Provider; 2] = [Provider::Kakao, Provider::Naver];

    /// Returns the provider's name as used in paths and storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kakao => "kakao",
            Self::Naver => "naver",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for a provider name that is not supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProvider {
    pub name: String,
}

impl fmt::Display for UnknownProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown identity provider '{}'", self.name)
    }
}

impl std::error::Error for UnknownProvider {}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kakao" => Ok(Self::Kakao),
            "naver" => Ok(Self::Naver),
            _ => Err(UnknownProvider {
                name: s.to_string(),
            }),
        }
    }
}

/// Profile data supplied by the provider. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub email: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
}

/// Identity claims from a provider callback.
///
/// `(provider, uid)` is the key an account is looked up by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthPayload {
    pub provider: Provider,
    pub uid: Option<String>,
    #[serde(default)]
    pub info: ProviderInfo,
}

impl OAuthPayload {
    /// Creates a payload without profile info.
    #[must_use]
    pub fn new(provider: Provider, uid: Option<String>) -> Self {
        Self {
            provider,
            uid,
            info: ProviderInfo::default(),
        }
    }

    /// Sets the email.
    #[must_use]
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.info.email = email;
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.info.name = name;
        self
    }

    /// Sets the profile image URL.
    #[must_use]
    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.info.image = image;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_names() {
        assert_eq!("kakao".parse::<Provider>(), Ok(Provider::Kakao));
        assert_eq!(" Naver ".parse::<Provider>(), Ok(Provider::Naver));
        assert!("github".parse::<Provider>().is_err());
    }

    #[test]
    fn display_matches_storage_name() {
        for provider in Provider::ALL {
            assert_eq!(provider.to_string(), provider.as_str());
            assert_eq!(provider.as_str().parse::<Provider>(), Ok(provider));
        }
    }

    #[test]
    fn payload_builder_sets_info() {
        let payload = OAuthPayload::new(Provider::Kakao, Some("123".to_string()))
            .with_email(Some("a@example.com".to_string()))
            .with_name(Some("Alice".to_string()));

        assert_eq!(payload.uid.as_deref(), Some("123"));
        assert_eq!(payload.info.email.as_deref(), Some("a@example.com"));
        assert_eq!(payload.info.name.as_deref(), Some("Alice"));
        assert!(payload.info.image.is_none());
    }

    #[test]
    fn payload_deserializes_without_info() {
        let payload: OAuthPayload =
            serde_json::from_str(r#"{"provider":"naver","uid":"abc"}"#).expect("deserialize");
        assert_eq!(payload.provider, Provider::Naver);
        assert_eq!(payload.info, ProviderInfo::default());
    }
}
