//! # IKon Auth - Platform token verification and service credentials
//!
//! Authentication for services running behind an OpenID-Connect identity
//! platform:
//!
//! - **Incoming tokens** - [`TokenVerifier`] checks bearer JWTs against the
//!   platform's JWKS (signature, algorithm allow-list, `iss`, `exp`/`nbf`)
//! - **Outgoing tokens** - [`ClientCredentialsCache`] obtains and caches the
//!   service's own access token with the OAuth2 client-credentials grant
//!
//! ## Architecture
//!
//! - [`config`] - [`AuthSettings`] loaded from the environment or a file
//! - [`jwt`] - discovery, key set and verifier
//! - [`oauth2`] - client-credentials token cache
//! - [`error`] - one error type per failure family
//! - `tower` - bearer-token middleware (feature `middleware`)
//!
//! Discovery and the JWKS fetch happen once, when the verifier is built; a
//! failure there is a startup failure. The key set is not refreshed
//! afterwards. Audience (`aud`) is not validated.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ikon_auth::{AuthSettings, ClientCredentialsCache, TokenVerifier};
//!
//! # async fn run() -> Result<(), ikon_auth::AuthError> {
//! let settings = AuthSettings::from_env()?;
//!
//! // Verify incoming requests
//! let verifier = Arc::new(TokenVerifier::connect(&settings).await?);
//! match verifier.verify("eyJhbGciOiJSUzI1NiIs...") {
//!     Ok(claims) => println!("authenticated {:?}", claims.subject()),
//!     Err(e) => println!("rejected ({:?}): {}", e.kind(), e),
//! }
//!
//! // Call other services
//! let credentials = Arc::new(ClientCredentialsCache::new(&settings)?);
//! let authorization = credentials.get_token().await?;
//! # let _ = authorization;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `middleware` - Tower layer verifying `Authorization: Bearer` headers

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
pub mod jwt;
pub mod oauth2;

#[cfg(feature = "middleware")]
#[cfg_attr(docsrs, doc(cfg(feature = "middleware")))]
pub mod tower;

#[doc(inline)]
pub use config::{AuthSettings, IssuerEndpoints};

#[doc(inline)]
pub use error::{
    AuthError, ConfigurationError, DiscoveryError, Result, TokenAcquisitionError,
    VerificationError, VerificationFailure,
};

#[doc(inline)]
pub use jwt::{
    Claims, IssuerConfigResolver, Jwk, KeyMaterialError, KeySet, TokenHeader, TokenVerifier,
};

#[doc(inline)]
pub use oauth2::{CachedToken, ClientCredentialsCache};

// Algorithm names used with `TokenVerifier::with_algorithms`
pub use jsonwebtoken::Algorithm;
