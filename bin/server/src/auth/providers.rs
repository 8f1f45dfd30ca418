//! Kakao and Naver sign-in clients.
//!
//! Each provider runs the OAuth 2.0 authorization code flow with PKCE:
//! - [`IdentityProvider::authorization_url`] builds the redirect to the
//!   provider's consent page and the [`AuthState`] to keep until the callback
//! - [`IdentityProvider::fetch_identity`] exchanges the returned code for an
//!   access token and reads the profile into an [`OAuthPayload`]

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gatehouse_accounts::{OAuthPayload, Provider};
use oauth2::{
    AccessToken, AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken,
    Scope, StandardRevocableToken, TokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenType,
    },
};
use rootcause::prelude::Report;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::{ProviderCredentials, ServerConfig};

/// Endpoints of one provider.
#[derive(Debug, Clone, Copy)]
struct Endpoints {
    authorize: &'static str,
    token: &'static str,
    profile: &'static str,
}

fn endpoints(provider: Provider) -> Endpoints {
    match provider {
        Provider::Kakao => Endpoints {
            authorize: "https://kauth.kakao.com/oauth/authorize",
            token: "https://kauth.kakao.com/oauth/token",
            profile: "https://kapi.kakao.com/v2/user/me",
        },
        Provider::Naver => Endpoints {
            authorize: "https://nid.naver.com/oauth2.0/authorize",
            token: "https://nid.naver.com/oauth2.0/token",
            profile: "https://openapi.naver.com/v1/nid/me",
        },
    }
}

/// Provider sign-in errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider has no client credentials.
    NotConfigured { provider: Provider },
    /// The credentials or URLs are invalid.
    Configuration { details: String },
    /// The authorization code could not be exchanged.
    TokenExchange { details: String },
    /// The profile could not be fetched or read.
    Profile { details: String },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured { provider } => {
                write!(f, "provider '{}' is not configured", provider)
            }
            Self::Configuration { details } => write!(f, "provider configuration: {}", details),
            Self::TokenExchange { details } => write!(f, "token exchange failed: {}", details),
            Self::Profile { details } => write!(f, "profile request failed: {}", details),
        }
    }
}

impl std::error::Error for ProviderError {}

/// State kept in a cookie between the redirect and the callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub provider: Provider,
    pub csrf_token: String,
    pub pkce_verifier: String,
}

/// An external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The provider this client signs in with.
    fn provider(&self) -> Provider;

    /// Returns the consent page URL and the state the callback must match.
    fn authorization_url(&self) -> (String, AuthState);

    /// Resolves a callback's authorization code into the signed-in identity.
    async fn fetch_identity(
        &self,
        code: &str,
        auth_state: &AuthState,
    ) -> Result<OAuthPayload, Report<ProviderError>>;
}

/// Token endpoint response of Kakao and Naver.
///
/// Naver sends `expires_in` as a string such as `"3600"`, which
/// [`oauth2::StandardTokenResponse`] rejects.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderTokenResponse {
    access_token: AccessToken,
    token_type: BasicTokenType,
    #[serde(
        default,
        deserialize_with = "lenient_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<RefreshToken>,
    #[serde(skip)]
    scopes: Option<Vec<Scope>>,
}

fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(u64),
        Text(String),
    }

    match Option::<Seconds>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Seconds::Number(seconds)) => Ok(Some(seconds)),
        Some(Seconds::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl TokenResponse for ProviderTokenResponse {
    type TokenType = BasicTokenType;

    fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    fn token_type(&self) -> &BasicTokenType {
        &self.token_type
    }

    fn expires_in(&self) -> Option<Duration> {
        self.expires_in.map(Duration::from_secs)
    }

    fn refresh_token(&self) -> Option<&RefreshToken> {
        self.refresh_token.as_ref()
    }

    fn scopes(&self) -> Option<&Vec<Scope>> {
        self.scopes.as_ref()
    }
}

/// `oauth2` client reading [`ProviderTokenResponse`].
type ProviderClient<HasAuthUrl = EndpointNotSet, HasTokenUrl = EndpointNotSet> = oauth2::Client<
    BasicErrorResponse,
    ProviderTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    HasAuthUrl,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    HasTokenUrl,
>;

/// Authorization code client for Kakao or Naver.
pub struct OAuthProvider {
    provider: Provider,
    client: ProviderClient<EndpointSet, EndpointSet>,
    http: reqwest::Client,
}

impl OAuthProvider {
    /// Creates a client from registered credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the client ID is blank or a URL is invalid.
    pub fn new(
        provider: Provider,
        credentials: &ProviderCredentials,
        redirect_uri: String,
    ) -> Result<Self, Report<ProviderError>> {
        if credentials.client_id.trim().is_empty() {
            return Err(ProviderError::NotConfigured { provider }.into());
        }

        let endpoints = endpoints(provider);
        let auth_url = AuthUrl::new(endpoints.authorize.to_string()).map_err(|e| {
            ProviderError::Configuration {
                details: format!("invalid authorize URL: {}", e),
            }
        })?;
        let token_url = TokenUrl::new(endpoints.token.to_string()).map_err(|e| {
            ProviderError::Configuration {
                details: format!("invalid token URL: {}", e),
            }
        })?;
        let redirect_url =
            RedirectUrl::new(redirect_uri).map_err(|e| ProviderError::Configuration {
                details: format!("invalid redirect URL: {}", e),
            })?;

        // Both providers read the client credentials from the form body.
        let mut client = ProviderClient::new(ClientId::new(credentials.client_id.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url)
            .set_auth_type(AuthType::RequestBody);
        if let Some(secret) = &credentials.client_secret {
            client = client.set_client_secret(ClientSecret::new(secret.clone()));
        }

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProviderError::Configuration {
                details: format!("HTTP client error: {}", e),
            })?;

        Ok(Self {
            provider,
            client,
            http,
        })
    }

    async fn exchange_code(
        &self,
        code: &str,
        auth_state: &AuthState,
    ) -> Result<AccessToken, Report<ProviderError>> {
        // Naver also expects the state on the token request.
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(auth_state.pkce_verifier.clone()))
            .add_extra_param("state", auth_state.csrf_token.clone())
            .request_async(&self.http)
            .await
            .map_err(|e| ProviderError::TokenExchange {
                details: e.to_string(),
            })?;

        Ok(token.access_token().clone())
    }

    async fn fetch_profile(
        &self,
        access_token: &AccessToken,
    ) -> Result<String, Report<ProviderError>> {
        let response = self
            .http
            .get(endpoints(self.provider).profile)
            .bearer_auth(access_token.secret())
            .send()
            .await
            .map_err(|e| ProviderError::Profile {
                details: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ProviderError::Profile {
            details: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(ProviderError::Profile {
                details: format!("HTTP {}: {}", status, body),
            }
            .into());
        }
        Ok(body)
    }
}

#[async_trait]
impl IdentityProvider for OAuthProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn authorization_url(&self) -> (String, AuthState) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge)
            .url();

        let state = AuthState {
            provider: self.provider,
            csrf_token: csrf_token.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        };
        (auth_url.to_string(), state)
    }

    #[instrument(skip_all, fields(provider = %self.provider))]
    async fn fetch_identity(
        &self,
        code: &str,
        auth_state: &AuthState,
    ) -> Result<OAuthPayload, Report<ProviderError>> {
        let access_token = self.exchange_code(code, auth_state).await?;
        let profile = self.fetch_profile(&access_token).await?;
        debug!("fetched provider profile");

        let payload = match self.provider {
            Provider::Kakao => parse_kakao_profile(&profile)?,
            Provider::Naver => parse_naver_profile(&profile)?,
        };
        Ok(payload)
    }
}

#[derive(Debug, Deserialize)]
struct KakaoProfile {
    id: i64,
    #[serde(default)]
    kakao_account: Option<KakaoAccount>,
    #[serde(default)]
    properties: Option<KakaoProperties>,
}

#[derive(Debug, Default, Deserialize)]
struct KakaoAccount {
    email: Option<String>,
    profile: Option<KakaoAccountProfile>,
}

#[derive(Debug, Default, Deserialize)]
struct KakaoAccountProfile {
    nickname: Option<String>,
    profile_image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct KakaoProperties {
    nickname: Option<String>,
    profile_image: Option<String>,
}

/// Reads a `/v2/user/me` response.
pub fn parse_kakao_profile(body: &str) -> Result<OAuthPayload, ProviderError> {
    let profile: KakaoProfile = serde_json::from_str(body).map_err(|e| ProviderError::Profile {
        details: format!("unreadable kakao profile: {}", e),
    })?;

    let account = profile.kakao_account.unwrap_or_default();
    let account_profile = account.profile.unwrap_or_default();
    let properties = profile.properties.unwrap_or_default();

    Ok(OAuthPayload::new(Provider::Kakao, Some(profile.id.to_string()))
        .with_email(account.email)
        .with_name(account_profile.nickname.or(properties.nickname))
        .with_image(
            account_profile
                .profile_image_url
                .or(properties.profile_image),
        ))
}

#[derive(Debug, Deserialize)]
struct NaverEnvelope {
    resultcode: String,
    #[serde(default)]
    message: String,
    response: Option<NaverProfile>,
}

#[derive(Debug, Deserialize)]
struct NaverProfile {
    id: Option<String>,
    email: Option<String>,
    name: Option<String>,
    nickname: Option<String>,
    profile_image: Option<String>,
}

/// Reads a `/v1/nid/me` response.
pub fn parse_naver_profile(body: &str) -> Result<OAuthPayload, ProviderError> {
    let envelope: NaverEnvelope =
        serde_json::from_str(body).map_err(|e| ProviderError::Profile {
            details: format!("unreadable naver profile: {}", e),
        })?;

    if envelope.resultcode != "00" {
        return Err(ProviderError::Profile {
            details: format!("naver result {}: {}", envelope.resultcode, envelope.message),
        });
    }
    let profile = envelope.response.ok_or_else(|| ProviderError::Profile {
        details: "naver profile missing response".to_string(),
    })?;

    Ok(OAuthPayload::new(Provider::Naver, profile.id)
        .with_email(profile.email)
        .with_name(profile.name.or(profile.nickname))
        .with_image(profile.profile_image))
}

/// The identity providers available for sign-in.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Provider, Arc<dyn IdentityProvider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds clients for every enabled provider that has credentials.
    ///
    /// Enabled providers without credentials are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if configured credentials are invalid.
    pub fn from_config(config: &ServerConfig) -> Result<Self, Report<ProviderError>> {
        let mut registry = Self::new();
        for provider in config.auth.omniauth_providers() {
            let Some(credentials) = config.providers.get(provider) else {
                warn!(provider = %provider, "provider enabled without credentials, skipping");
                continue;
            };
            let client = OAuthProvider::new(provider, credentials, config.redirect_uri(provider))?;
            registry = registry.with(Arc::new(client));
        }
        Ok(registry)
    }

    /// Adds or replaces the client for its provider.
    #[must_use]
    pub fn with(mut self, client: Arc<dyn IdentityProvider>) -> Self {
        self.providers.insert(client.provider(), client);
        self
    }

    /// Returns the client for `provider`.
    #[must_use]
    pub fn get(&self, provider: Provider) -> Option<Arc<dyn IdentityProvider>> {
        self.providers.get(&provider).cloned()
    }
}
