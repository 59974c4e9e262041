//! JWT verification against the platform's published keys
//!
//! ```text
//! IssuerConfigResolver ──► KeySet ──► TokenVerifier::verify(token) ──► Claims
//!   (discovery doc)        (JWKS)       (header, key, signature, iss)
//! ```
//!
//! Discovery and the JWKS fetch happen once, in [`TokenVerifier::connect`].
//! After that, verification is a pure function of the token and the key set.
//!
//! # Modules
//!
//! - `discovery` - OIDC discovery document → JWKS URI
//! - `jwks` - key set loading, lookup and RSA key construction
//! - `validator` - token verification

pub mod discovery;
pub mod jwks;
pub mod validator;

pub use discovery::IssuerConfigResolver;
pub use jwks::{Jwk, KeyMaterialError, KeySet};
pub use validator::TokenVerifier;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::VerificationError;

/// Verified token claims
///
/// Produced only after the signature and issuer checks pass. Values are the
/// token payload exactly as sent, including claims this crate doesn't know.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    /// Look up a claim by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// The `iss` claim, if it is a string
    pub fn issuer(&self) -> Option<&str> {
        self.get("iss").and_then(Value::as_str)
    }

    /// The `sub` claim, if it is a string
    pub fn subject(&self) -> Option<&str> {
        self.get("sub").and_then(Value::as_str)
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Take the underlying map
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Claims> for Value {
    fn from(claims: Claims) -> Self {
        Value::Object(claims.0)
    }
}

/// Decoded but unverified JWT header
///
/// Only `alg` and `kid` are read. Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm name as written in the header
    #[serde(default)]
    pub alg: Option<String>,
    /// Key identifier
    #[serde(default)]
    pub kid: Option<String>,
}

impl TokenHeader {
    /// Decode the header segment of a compact JWT without checking anything else
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::Malformed`] if the token does not have
    /// exactly three segments or the header is not base64url-encoded JSON.
    pub fn decode(token: &str) -> Result<Self, VerificationError> {
        let mut segments = token.split('.');
        let (Some(header), Some(_payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(VerificationError::Malformed(
                "expected three dot-separated segments".to_string(),
            ));
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(header.trim_end_matches('='))
            .map_err(|e| VerificationError::Malformed(format!("header is not base64url: {e}")))?;

        let mut parsed: Self = serde_json::from_slice(&bytes)
            .map_err(|e| VerificationError::Malformed(format!("header is not valid JSON: {e}")))?;

        parsed.alg = parsed.alg.filter(|alg| !alg.is_empty());
        parsed.kid = parsed.kid.filter(|kid| !kid.is_empty());
        Ok(parsed)
    }
}
