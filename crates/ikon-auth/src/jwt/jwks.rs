//! JWKS (JSON Web Key Set) loading and key lookup
//!
//! The key set is fetched once and never refreshed. Lookup is by `kid`, with
//! a fallback to the first `use == "sig"` key for tokens that carry no `kid`.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::error::DiscoveryError;

/// One public key descriptor from a JWKS document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Intended use (`sig` for signature keys)
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    /// Key type; only `RSA` can be used for verification
    pub kty: String,

    /// RSA modulus, base64url big-endian
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent, base64url big-endian
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// Declared algorithm, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
}

impl Jwk {
    /// Whether this key is published for signature verification
    pub fn is_signing_key(&self) -> bool {
        self.key_use.as_deref() == Some("sig")
    }

    /// Build an RSA verification key from `n` and `e`
    ///
    /// # Errors
    ///
    /// Returns [`KeyMaterialError`] if the key is not RSA, lacks a component,
    /// or a component is not base64url.
    pub fn decoding_key(&self) -> Result<DecodingKey, KeyMaterialError> {
        if self.kty != "RSA" {
            return Err(KeyMaterialError::UnsupportedKeyType(self.kty.clone()));
        }

        let n = decode_component("n", self.n.as_deref())?;
        let e = decode_component("e", self.e.as_deref())?;

        Ok(DecodingKey::from_rsa_raw_components(&n, &e))
    }
}

/// Why a JWK could not be turned into a verification key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyMaterialError {
    /// `kty` is not `RSA`
    #[error("unsupported key type '{0}'")]
    UnsupportedKeyType(String),

    /// `n` or `e` is absent or empty
    #[error("missing RSA component '{0}'")]
    MissingComponent(&'static str),

    /// `n` or `e` is not base64url
    #[error("RSA component '{component}' is not base64url: {reason}")]
    InvalidEncoding {
        /// Which component
        component: &'static str,
        /// Decoder message
        reason: String,
    },

    /// The crypto backend refused the key
    #[error("{0}")]
    Rejected(String),
}

/// Decode a base64url big-endian integer, padding it to a multiple of 4 first
fn decode_component(
    component: &'static str,
    value: Option<&str>,
) -> Result<Vec<u8>, KeyMaterialError> {
    let value = value
        .map(|v| v.trim_end_matches('='))
        .filter(|v| !v.is_empty())
        .ok_or(KeyMaterialError::MissingComponent(component))?;

    let mut padded = value.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }

    URL_SAFE
        .decode(padded)
        .map_err(|e| KeyMaterialError::InvalidEncoding {
            component,
            reason: e.to_string(),
        })
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

/// Immutable `kid` → JWK mapping
///
/// Keys keep the order in which their `kid` first appeared. A later entry with
/// the same `kid` replaces the earlier value in place. Keys without a `kid`
/// are kept (they can still be the first signing key) but are not indexed.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<Jwk>,
    by_kid: HashMap<String, usize>,
}

impl KeySet {
    /// Fetch and parse the JWKS document at `jwks_uri`
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] on network failure, a non-2xx status, or a
    /// body that is not a JWKS document.
    pub async fn load(
        http_client: &reqwest::Client,
        jwks_uri: &str,
    ) -> Result<Self, DiscoveryError> {
        info!(jwks_uri = %jwks_uri, "Fetching JWKS from endpoint");

        let response = http_client.get(jwks_uri).send().await.map_err(|e| {
            error!(jwks_uri = %jwks_uri, error = %e, "Failed to fetch JWKS");
            DiscoveryError::Request {
                url: jwks_uri.to_string(),
                source: e,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(
                jwks_uri = %jwks_uri,
                status = %status,
                "JWKS endpoint returned error status"
            );
            return Err(DiscoveryError::Status {
                url: jwks_uri.to_string(),
                status,
            });
        }

        let body = response.text().await.map_err(|e| DiscoveryError::Request {
            url: jwks_uri.to_string(),
            source: e,
        })?;

        let key_set = Self::from_json(&body).map_err(|reason| {
            error!(jwks_uri = %jwks_uri, error = %reason, "Failed to parse JWKS JSON");
            DiscoveryError::InvalidDocument {
                url: jwks_uri.to_string(),
                reason,
            }
        })?;

        info!(
            jwks_uri = %jwks_uri,
            key_count = key_set.len(),
            kids = ?key_set.key_ids().collect::<Vec<_>>(),
            "Successfully fetched JWKS"
        );

        Ok(key_set)
    }

    /// Parse a JWKS document (`{"keys": [...]}`)
    ///
    /// # Errors
    ///
    /// Returns the parser message if the document is not valid JWKS JSON.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let document: JwksDocument = serde_json::from_str(json).map_err(|e| e.to_string())?;
        Ok(Self::from_keys(document.keys))
    }

    /// Build a key set from keys in document order
    pub fn from_keys(keys: impl IntoIterator<Item = Jwk>) -> Self {
        let mut set = Self::default();
        for key in keys {
            match key.kid.clone().filter(|kid| !kid.is_empty()) {
                Some(kid) => match set.by_kid.get(&kid) {
                    Some(&index) => set.keys[index] = key,
                    None => {
                        set.by_kid.insert(kid, set.keys.len());
                        set.keys.push(key);
                    }
                },
                None => set.keys.push(key),
            }
        }
        set
    }

    /// Look up a key by `kid`
    pub fn get(&self, kid: &str) -> Option<&Jwk> {
        self.by_kid.get(kid).map(|&index| &self.keys[index])
    }

    /// The first key (in document order) whose `use` is `sig`
    pub fn first_signing_key(&self) -> Option<&Jwk> {
        self.keys.iter().find(|key| key.is_signing_key())
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set holds no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key identifiers in document order
    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().filter_map(|key| key.kid.as_deref())
    }
}
