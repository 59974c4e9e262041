//! Error types
//!
//! Every failure family gets its own enum so callers can tell startup failures
//! (configuration, discovery) apart from per-request failures (verification)
//! and outbound failures (token acquisition):
//!
//! | Error | When | Recoverable |
//! |-------|------|-------------|
//! | [`ConfigurationError`] | settings missing or invalid | no, abort startup |
//! | [`DiscoveryError`] | discovery document / JWKS fetch or parse | no, abort startup |
//! | [`VerificationError`] | incoming token rejected | no, answer 401/403 |
//! | [`TokenAcquisitionError`] | client-credentials grant failed | caller may retry |
//!
//! [`AuthError`] wraps all of them for callers that only need one error type.

use reqwest::StatusCode;
use thiserror::Error;

use crate::jwt::jwks::KeyMaterialError;

/// Result alias defaulting to [`AuthError`]
pub type Result<T, E = AuthError> = std::result::Result<T, E>;

/// Umbrella error for every failure this crate can produce
#[derive(Debug, Error)]
pub enum AuthError {
    /// Settings missing or invalid
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Discovery document or JWKS could not be loaded
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Incoming token rejected
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Outbound token could not be obtained
    #[error(transparent)]
    TokenAcquisition(#[from] TokenAcquisitionError),
}

/// Missing or invalid configuration, detected once at construction time
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// One or more required settings are empty
    #[error("missing required OAuth settings: {}", .0.join(", "))]
    MissingSettings(Vec<&'static str>),

    /// The base issuer URL is not an absolute http(s) URL
    #[error("invalid base issuer URL '{url}': {reason}")]
    InvalidIssuerUrl {
        /// The offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Settings could not be loaded from the environment or a file
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    /// Settings file does not exist
    #[error("settings file not found: {0}")]
    FileNotFound(std::path::PathBuf),

    /// Settings file extension is not one of toml/yaml/yml/json
    #[error("unsupported settings file format: {0}. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat(std::path::PathBuf),

    /// The HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Failure while resolving the JWKS endpoint or loading the key set
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Network failure talking to the identity platform
    #[error("request to {url} failed: {source}")]
    Request {
        /// The URL being fetched
        url: String,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response
    #[error("{url} returned status {status}")]
    Status {
        /// The URL being fetched
        url: String,
        /// Response status
        status: StatusCode,
    },

    /// Body was not the expected JSON document
    #[error("invalid document from {url}: {reason}")]
    InvalidDocument {
        /// The URL being fetched
        url: String,
        /// What was wrong with it
        reason: String,
    },
}

/// Coarse classification of a [`VerificationError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationFailure {
    /// Token is not a well-formed JWT
    Malformed,
    /// No usable key for the token
    KeyResolution,
    /// Signature did not verify under the resolved key
    Signature,
    /// Signature verified but the claims were rejected
    ClaimValidation,
}

/// Reason an incoming token was rejected
///
/// The `Display` output is the human-readable reason handed to adapters.
/// No claims are ever returned alongside a `VerificationError`.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// Token does not have three dot-separated segments, or a segment is not decodable
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Header has no `alg`
    #[error("missing algorithm")]
    MissingAlgorithm,

    /// Header `alg` is unknown or not on the allow-list
    #[error("algorithm not allowed: {0}")]
    AlgorithmNotAllowed(String),

    /// Header names a `kid` the key set does not contain
    #[error("unknown key id: {0}")]
    UnknownKeyId(String),

    /// Header has no `kid` and the key set has no `use == "sig"` key
    #[error("no signature key available")]
    NoSignatureKey,

    /// Selected key cannot be turned into an RSA public key
    #[error("invalid key material: {0}")]
    InvalidKey(#[from] KeyMaterialError),

    /// Signature does not verify
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// `iss` does not equal the configured issuer
    #[error("issuer mismatch: expected '{expected}'")]
    IssuerMismatch {
        /// The configured issuer
        expected: String,
    },

    /// A required claim is absent
    #[error("missing required claim: {0}")]
    MissingClaim(String),

    /// `exp` is in the past
    #[error("token expired")]
    Expired,

    /// `nbf` is in the future
    #[error("token not yet valid")]
    NotYetValid,

    /// A registered claim has the wrong type or value
    #[error("invalid claim: {0}")]
    InvalidClaim(String),
}

impl VerificationError {
    /// Classify this error
    pub fn kind(&self) -> VerificationFailure {
        match self {
            Self::Malformed(_) | Self::MissingAlgorithm => VerificationFailure::Malformed,
            Self::UnknownKeyId(_) | Self::NoSignatureKey | Self::InvalidKey(_) => {
                VerificationFailure::KeyResolution
            }
            Self::AlgorithmNotAllowed(_) | Self::InvalidSignature(_) => {
                VerificationFailure::Signature
            }
            Self::IssuerMismatch { .. }
            | Self::MissingClaim(_)
            | Self::Expired
            | Self::NotYetValid
            | Self::InvalidClaim(_) => VerificationFailure::ClaimValidation,
        }
    }

    /// Human-readable reason, identical to the `Display` output
    pub fn reason(&self) -> String {
        self.to_string()
    }

    /// Map a `jsonwebtoken` decoding failure onto our taxonomy
    pub(crate) fn from_jwt(error: jsonwebtoken::errors::Error, expected_issuer: &str) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match error.kind() {
            ErrorKind::InvalidSignature => {
                Self::InvalidSignature("signature does not match".into())
            }
            ErrorKind::InvalidAlgorithm => {
                Self::InvalidSignature("algorithm does not match the key".into())
            }
            ErrorKind::InvalidIssuer => Self::IssuerMismatch {
                expected: expected_issuer.to_string(),
            },
            ErrorKind::MissingRequiredClaim(claim) => Self::MissingClaim(claim.clone()),
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidClaimFormat(claim) => {
                Self::InvalidClaim(format!("'{claim}' has an invalid format"))
            }
            ErrorKind::InvalidSubject => Self::InvalidClaim("'sub' does not match".into()),
            ErrorKind::InvalidAudience => Self::InvalidClaim("'aud' does not match".into()),
            ErrorKind::InvalidRsaKey(reason) => {
                Self::InvalidKey(KeyMaterialError::Rejected(reason.clone()))
            }
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Self::Malformed(error.to_string()),
            _ => Self::InvalidSignature(error.to_string()),
        }
    }
}

/// Failure obtaining the service's own token
#[derive(Debug, Error)]
pub enum TokenAcquisitionError {
    /// Network failure or timeout talking to the token endpoint
    #[error("token request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// Non-2xx response from the token endpoint
    #[error("token endpoint returned status {status}: {body}")]
    Status {
        /// Response status
        status: StatusCode,
        /// Response body, for diagnostics
        body: String,
    },

    /// 2xx response whose body lacks `access_token` / `expires_in`
    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}
