//! Client-credentials token cache
//!
//! Holds the service's own access token and renews it lazily once expired.
//! The cache lock is held across the token request, so concurrent callers
//! that find the cache empty or stale wait for a single grant and share its
//! result instead of each issuing one.

use std::fmt;
use std::time::{Duration, SystemTime};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::config::AuthSettings;
use crate::error::{ConfigurationError, TokenAcquisitionError};

/// An access token and the instant it stops being usable
///
/// Replaced wholesale on regeneration, never modified.
#[derive(Clone)]
pub struct CachedToken {
    value: String,
    expires_at: SystemTime,
}

impl CachedToken {
    /// Create a token expiring at `expires_at`
    pub fn new(value: impl Into<String>, expires_at: SystemTime) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// The raw access token
    pub fn value(&self) -> &str {
        &self.value
    }

    /// When the token expires
    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// Whether the token can still be handed out at `now`
    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        now < self.expires_at
    }

    /// `Authorization` header value for this token
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

// Manual Debug impl to keep the token out of logs
impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token endpoint response; only the two fields we need
#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    /// Any JSON number; some platforms send `3600.0`
    expires_in: Option<f64>,
}

/// Caches the token obtained with the OAuth2 client-credentials grant
///
/// Share one instance per process behind an `Arc`.
///
/// # Example
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use ikon_auth::{AuthSettings, ClientCredentialsCache};
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = AuthSettings::from_env()?;
/// let cache = Arc::new(ClientCredentialsCache::new(&settings)?);
///
/// let authorization = cache.get_token().await?;
/// assert!(authorization.starts_with("Bearer "));
/// # Ok(())
/// # }
/// ```
pub struct ClientCredentialsCache {
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    request_timeout: Duration,
    http_client: reqwest::Client,
    /// Held across the grant request, making refresh single-flight
    cached: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for ClientCredentialsCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentialsCache")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl ClientCredentialsCache {
    /// Create an empty cache
    ///
    /// No request is made until the first [`get_token`](Self::get_token).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingSettings`] naming every empty item
    /// among client id, client secret and base issuer URL, or
    /// [`ConfigurationError::InvalidIssuerUrl`] for a malformed base URL.
    pub fn new(settings: &AuthSettings) -> Result<Self, ConfigurationError> {
        settings.validate_credentials()?;

        let http_client = reqwest::Client::builder()
            .build()
            .map_err(ConfigurationError::HttpClient)?;

        Ok(Self {
            token_url: settings.endpoints().token_url(),
            client_id: settings.oauth_client_id.clone(),
            client_secret: settings.oauth_client_secret.clone(),
            request_timeout: settings.token_request_timeout(),
            http_client,
            cached: Mutex::new(None),
        })
    }

    /// Return `"Bearer <token>"`, requesting a new token if none is cached or
    /// the cached one has expired
    ///
    /// # Errors
    ///
    /// Returns [`TokenAcquisitionError`] if a new token was needed and the
    /// grant failed. The failure is not cached; the next call tries again.
    pub async fn get_token(&self) -> Result<String, TokenAcquisitionError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref()
            && token.is_valid_at(SystemTime::now())
        {
            debug!(token_url = %self.token_url, "Using cached access token");
            return Ok(token.bearer());
        }

        let token = self.request_token().await?;
        let bearer = token.bearer();
        *cached = Some(token);
        Ok(bearer)
    }

    /// Request a new token now and replace the cached one, valid or not
    ///
    /// # Errors
    ///
    /// Returns [`TokenAcquisitionError`] if the grant fails; the previously
    /// cached token is then left in place.
    pub async fn regenerate(&self) -> Result<CachedToken, TokenAcquisitionError> {
        let mut cached = self.cached.lock().await;
        let token = self.request_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Expiry of the currently cached token, if any
    pub async fn cached_expiry(&self) -> Option<SystemTime> {
        self.cached.lock().await.as_ref().map(CachedToken::expires_at)
    }

    async fn request_token(&self) -> Result<CachedToken, TokenAcquisitionError> {
        info!(token_url = %self.token_url, client_id = %self.client_id, "Requesting access token");

        let response = self
            .http_client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| {
                error!(token_url = %self.token_url, error = %e, "Token request failed");
                TokenAcquisitionError::Request(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                token_url = %self.token_url,
                status = %status,
                "Token endpoint returned error status"
            );
            return Err(TokenAcquisitionError::Status { status, body });
        }

        let body = response.text().await.map_err(TokenAcquisitionError::Request)?;
        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            error!(token_url = %self.token_url, error = %e, "Failed to parse token response");
            invalid_response(e.to_string())
        })?;

        let access_token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| invalid_response("missing access_token"))?;
        let expires_in = parsed
            .expires_in
            .ok_or_else(|| invalid_response("missing expires_in"))?;

        let expires_at = Duration::try_from_secs_f64(expires_in)
            .ok()
            .and_then(|lifetime| SystemTime::now().checked_add(lifetime))
            .ok_or_else(|| invalid_response(format!("expires_in out of range: {expires_in}")))?;

        info!(token_url = %self.token_url, expires_in, "Obtained access token");
        Ok(CachedToken::new(access_token, expires_at))
    }
}

fn invalid_response(reason: impl Into<String>) -> TokenAcquisitionError {
    TokenAcquisitionError::InvalidResponse(reason.into())
}
