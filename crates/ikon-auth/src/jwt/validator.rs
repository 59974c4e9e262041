//! Token verification
//!
//! A token is accepted only if:
//! - its header names an allowed algorithm
//! - its `kid` is in the key set, or it has no `kid` and the set has a
//!   `use == "sig"` key
//! - the signature verifies under that key with the header's algorithm
//! - `iss` equals the configured issuer
//! - `exp` / `nbf`, when present, hold
//!
//! `aud` is not checked.

use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use tracing::{debug, warn};

use super::discovery::IssuerConfigResolver;
use super::jwks::{Jwk, KeySet};
use super::{Claims, TokenHeader};
use crate::config::AuthSettings;
use crate::error::{AuthError, VerificationError};

/// Upper bound for [`TokenVerifier::with_clock_skew`]
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(24 * 60 * 60);

/// RSA algorithms accepted by default
pub const DEFAULT_ALGORITHMS: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// Verifies bearer tokens issued by the identity platform
///
/// Holds the key set loaded at construction; it is never refreshed, so a key
/// rotation at the platform requires building a new verifier.
///
/// # Example
///
/// ```rust,no_run
/// # use ikon_auth::{AuthSettings, TokenVerifier};
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = AuthSettings::from_env()?;
/// let verifier = TokenVerifier::connect(&settings).await?;
///
/// let claims = verifier.verify("eyJhbGciOiJSUzI1NiIs...")?;
/// println!("authenticated {:?}", claims.subject());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    /// Expected `iss` claim
    issuer: String,
    /// Keys fetched at construction
    key_set: KeySet,
    /// Header algorithms that may be used
    allowed_algorithms: Vec<Algorithm>,
    /// Clock skew tolerance for `exp` / `nbf` (default: none)
    clock_skew: Duration,
}

impl TokenVerifier {
    /// Resolve the JWKS endpoint and load the key set
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the base issuer URL is missing
    /// or invalid, and [`AuthError::Discovery`] if the discovery document or
    /// the JWKS cannot be loaded. Nothing is retried.
    pub async fn connect(settings: &AuthSettings) -> Result<Self, AuthError> {
        settings.validate_issuer()?;

        let http_client = settings.http_client()?;
        let resolver = IssuerConfigResolver::new(http_client.clone());
        let jwks_uri = resolver.resolve_jwks_uri(&settings.base_issuer_url).await?;
        let key_set = KeySet::load(&http_client, &jwks_uri).await?;

        Ok(Self::from_key_set(settings.endpoints().issuer(), key_set))
    }

    /// Build a verifier from an already loaded key set
    pub fn from_key_set(issuer: impl Into<String>, key_set: KeySet) -> Self {
        Self {
            issuer: issuer.into(),
            key_set,
            allowed_algorithms: DEFAULT_ALGORITHMS.to_vec(),
            clock_skew: Duration::ZERO,
        }
    }

    /// Replace the algorithm allow-list
    ///
    /// Only asymmetric algorithms make sense here; the keys are RSA public keys.
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }

    /// Set clock skew tolerance for `exp` and `nbf`
    ///
    /// Values above [`MAX_CLOCK_SKEW`] are clamped to it.
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew.min(MAX_CLOCK_SKEW);
        self
    }

    /// Verify a compact JWT and return its claims
    ///
    /// Performs no I/O.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError`] describing the first check that failed.
    /// Use [`VerificationError::kind`] to tell key resolution, signature and
    /// claim failures apart.
    pub fn verify(&self, token: &str) -> Result<Claims, VerificationError> {
        self.verify_inner(token).inspect_err(|e| {
            warn!(
                reason = %e,
                kind = ?e.kind(),
                issuer = %self.issuer,
                "Token verification failed"
            );
        })
    }

    fn verify_inner(&self, token: &str) -> Result<Claims, VerificationError> {
        let header = TokenHeader::decode(token)?;
        debug!(alg = ?header.alg, kid = ?header.kid, "Decoded token header");

        let alg_name = header.alg.as_deref().ok_or(VerificationError::MissingAlgorithm)?;
        let algorithm = Algorithm::from_str(alg_name)
            .ok()
            .filter(|alg| self.allowed_algorithms.contains(alg))
            .ok_or_else(|| VerificationError::AlgorithmNotAllowed(alg_name.to_string()))?;

        let jwk = self.select_key(header.kid.as_deref())?;
        let decoding_key: DecodingKey = jwk.decoding_key()?;

        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["iss"]);
        validation.validate_aud = false;
        validation.validate_nbf = true;
        validation.leeway = self.clock_skew.as_secs();

        let data = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|e| VerificationError::from_jwt(e, &self.issuer))?;

        debug!(sub = ?data.claims.subject(), "Token verified");
        Ok(data.claims)
    }

    fn select_key(&self, kid: Option<&str>) -> Result<&Jwk, VerificationError> {
        match kid {
            Some(kid) => self
                .key_set
                .get(kid)
                .ok_or_else(|| VerificationError::UnknownKeyId(kid.to_string())),
            None => {
                let jwk = self
                    .key_set
                    .first_signing_key()
                    .ok_or(VerificationError::NoSignatureKey)?;
                debug!(kid = ?jwk.kid, "No kid in header, using first signature key");
                Ok(jwk)
            }
        }
    }

    /// Expected `iss` claim
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Keys this verifier checks against
    pub fn key_set(&self) -> &KeySet {
        &self.key_set
    }

    /// Header algorithms that are accepted
    pub fn allowed_algorithms(&self) -> &[Algorithm] {
        &self.allowed_algorithms
    }

    /// Clock skew tolerance applied to `exp` and `nbf`
    pub fn clock_skew(&self) -> Duration {
        self.clock_skew
    }
}
