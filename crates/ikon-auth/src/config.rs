//! Settings for talking to the identity platform
//!
//! The platform is addressed by a single base URL; every endpoint the crate
//! uses hangs off `{base}/platform`:
//!
//! | Endpoint | URL |
//! |----------|-----|
//! | Issuer (`iss` claim) | `{base}/platform` |
//! | OIDC discovery | `{base}/platform/.well-known/openid-configuration` |
//! | Token grant | `{base}/platform/oauth2/token` |
//!
//! Settings come from unprefixed environment variables (`BASE_ISSUER_URL`,
//! `OAUTH_CLIENT_ID`, `OAUTH_CLIENT_SECRET`, ...) and optionally from a
//! TOML/YAML/JSON file, with the environment taking precedence.

use std::path::Path;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::error::ConfigurationError;

/// Default timeout for discovery and JWKS requests
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Default timeout for the client-credentials grant request
pub const DEFAULT_TOKEN_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Connection settings for the identity platform
///
/// The client secret is held in a [`SecretString`] and is redacted from
/// `Debug` output.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Base URL of the identity platform (e.g. `https://idp.example`)
    #[serde(default)]
    pub base_issuer_url: String,

    /// OAuth client id used for the client-credentials grant
    #[serde(default)]
    pub oauth_client_id: String,

    /// OAuth client secret used for the client-credentials grant
    #[serde(default = "empty_secret", deserialize_with = "deserialize_secret")]
    pub oauth_client_secret: SecretString,

    /// Timeout applied to discovery and JWKS requests
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Timeout applied to each token-grant request
    #[serde(default = "default_token_request_timeout")]
    pub token_request_timeout_secs: u64,
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new())
}

fn default_http_timeout() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_token_request_timeout() -> u64 {
    DEFAULT_TOKEN_REQUEST_TIMEOUT_SECS
}

// Custom deserialization for SecretString
fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    Ok(SecretString::new(s))
}

impl AuthSettings {
    /// Build settings programmatically with default timeouts
    pub fn new(
        base_issuer_url: impl Into<String>,
        oauth_client_id: impl Into<String>,
        oauth_client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_issuer_url: base_issuer_url.into(),
            oauth_client_id: oauth_client_id.into(),
            oauth_client_secret: SecretString::new(oauth_client_secret.into()),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            token_request_timeout_secs: DEFAULT_TOKEN_REQUEST_TIMEOUT_SECS,
        }
    }

    /// Load settings from environment variables
    ///
    /// Missing values are left empty here; they are reported by
    /// [`validate_issuer`](Self::validate_issuer) /
    /// [`validate_credentials`](Self::validate_credentials) when the
    /// component that needs them is constructed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Load`] if a value cannot be converted
    /// (e.g. a non-numeric timeout).
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_environment(config::Environment::default())
    }

    /// Load settings from a file (TOML, YAML, or JSON), with environment
    /// variables overriding file values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist
    /// - The file extension is not `.toml`, `.yaml`, `.yml` or `.json`
    /// - The file contents cannot be parsed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        Self::from_file_and_environment(path.as_ref(), config::Environment::default())
    }

    fn from_environment(environment: config::Environment) -> Result<Self, ConfigurationError> {
        let settings = config::Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    fn from_file_and_environment(
        path: &Path,
        environment: config::Environment,
    ) -> Result<Self, ConfigurationError> {
        use config::{File, FileFormat};

        if !path.exists() {
            return Err(ConfigurationError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigurationError::UnsupportedFormat(path.to_path_buf())),
        };

        let name = path
            .to_str()
            .ok_or_else(|| ConfigurationError::UnsupportedFormat(path.to_path_buf()))?;

        let settings = config::Config::builder()
            .add_source(File::new(name, format))
            // Environment variables override file settings
            .add_source(environment)
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Endpoints derived from the base issuer URL
    pub fn endpoints(&self) -> IssuerEndpoints {
        IssuerEndpoints::new(&self.base_issuer_url)
    }

    /// Timeout for discovery and JWKS requests
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Timeout for each token-grant request
    pub fn token_request_timeout(&self) -> Duration {
        Duration::from_secs(self.token_request_timeout_secs)
    }

    /// Check the settings needed to verify incoming tokens
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingSettings`] when the base issuer URL
    /// is empty and [`ConfigurationError::InvalidIssuerUrl`] when it is not an
    /// absolute http(s) URL.
    pub fn validate_issuer(&self) -> Result<(), ConfigurationError> {
        let base = self.base_issuer_url.trim();
        if base.is_empty() {
            return Err(ConfigurationError::MissingSettings(vec!["base_issuer_url"]));
        }

        let parsed = Url::parse(base).map_err(|e| ConfigurationError::InvalidIssuerUrl {
            url: base.to_string(),
            reason: e.to_string(),
        })?;

        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ConfigurationError::InvalidIssuerUrl {
                url: base.to_string(),
                reason: format!("unsupported scheme '{other}'"),
            }),
        }
    }

    /// Check the settings needed to request the service's own token
    ///
    /// All missing items are reported together.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingSettings`] listing every empty
    /// item among client id, client secret and base issuer URL, or
    /// [`ConfigurationError::InvalidIssuerUrl`] for a malformed base URL.
    pub fn validate_credentials(&self) -> Result<(), ConfigurationError> {
        let mut missing = Vec::new();
        if self.oauth_client_id.trim().is_empty() {
            missing.push("oauth_client_id");
        }
        if self.oauth_client_secret.expose_secret().trim().is_empty() {
            missing.push("oauth_client_secret");
        }
        if self.base_issuer_url.trim().is_empty() {
            missing.push("base_issuer_url");
        }

        if !missing.is_empty() {
            return Err(ConfigurationError::MissingSettings(missing));
        }

        self.validate_issuer()
    }

    /// Build the HTTP client used for discovery and JWKS requests
    pub(crate) fn http_client(&self) -> Result<reqwest::Client, ConfigurationError> {
        reqwest::Client::builder()
            .timeout(self.http_timeout())
            .build()
            .map_err(ConfigurationError::HttpClient)
    }
}

/// URLs of the identity platform endpoints, derived from the base issuer URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerEndpoints {
    base: String,
}

impl IssuerEndpoints {
    /// Derive endpoints from a base URL; a trailing `/` is ignored
    pub fn new(base_issuer_url: &str) -> Self {
        Self {
            base: base_issuer_url.trim().trim_end_matches('/').to_string(),
        }
    }

    /// The base URL as configured, without a trailing `/`
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Expected `iss` claim of tokens issued by the platform
    pub fn issuer(&self) -> String {
        format!("{}/platform", self.base)
    }

    /// OIDC discovery document location
    pub fn discovery_url(&self) -> String {
        format!("{}/platform/.well-known/openid-configuration", self.base)
    }

    /// OAuth2 token endpoint
    pub fn token_url(&self) -> String {
        format!("{}/platform/oauth2/token", self.base)
    }
}
