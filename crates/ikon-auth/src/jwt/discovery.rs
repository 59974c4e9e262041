//! OpenID Connect discovery
//!
//! Resolves the platform's discovery document to its JWKS endpoint. There is
//! no retry and no fallback URI: a failure here aborts verifier construction.

use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::IssuerEndpoints;
use crate::error::DiscoveryError;

/// OpenID Connect discovery document
///
/// Only `jwks_uri` is consumed; every other field is ignored.
#[derive(Debug, Clone, Deserialize)]
struct DiscoveryDocument {
    #[serde(default)]
    jwks_uri: Option<String>,
}

/// Resolves `{base}/platform/.well-known/openid-configuration` to a JWKS URI
#[derive(Debug, Clone)]
pub struct IssuerConfigResolver {
    http_client: reqwest::Client,
}

impl IssuerConfigResolver {
    /// Create a resolver that uses the given HTTP client (and its timeout)
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Fetch the discovery document and return its `jwks_uri`
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] on network failure, a non-2xx status, a body
    /// that is not JSON, or a document without a non-empty `jwks_uri`.
    pub async fn resolve_jwks_uri(&self, base_issuer_url: &str) -> Result<String, DiscoveryError> {
        let discovery_url = IssuerEndpoints::new(base_issuer_url).discovery_url();

        info!(discovery_url = %discovery_url, "Fetching OIDC discovery document");

        let response = self
            .http_client
            .get(&discovery_url)
            .send()
            .await
            .map_err(|e| {
                error!(
                    discovery_url = %discovery_url,
                    error = %e,
                    "Failed to fetch discovery document"
                );
                DiscoveryError::Request {
                    url: discovery_url.clone(),
                    source: e,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(
                discovery_url = %discovery_url,
                status = %status,
                "Discovery endpoint returned error status"
            );
            return Err(DiscoveryError::Status {
                url: discovery_url,
                status,
            });
        }

        let body = response.text().await.map_err(|e| DiscoveryError::Request {
            url: discovery_url.clone(),
            source: e,
        })?;

        let document: DiscoveryDocument = serde_json::from_str(&body).map_err(|e| {
            error!(
                discovery_url = %discovery_url,
                error = %e,
                "Failed to parse discovery document"
            );
            DiscoveryError::InvalidDocument {
                url: discovery_url.clone(),
                reason: e.to_string(),
            }
        })?;

        match document.jwks_uri {
            Some(jwks_uri) if !jwks_uri.is_empty() => {
                info!(jwks_uri = %jwks_uri, "Resolved JWKS URI");
                Ok(jwks_uri)
            }
            _ => {
                debug!(discovery_url = %discovery_url, "Discovery document has no jwks_uri");
                Err(DiscoveryError::InvalidDocument {
                    url: discovery_url,
                    reason: "missing field `jwks_uri`".to_string(),
                })
            }
        }
    }
}
