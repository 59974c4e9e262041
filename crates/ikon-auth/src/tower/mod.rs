//! # Tower middleware for bearer token verification
//!
//! Available with the `middleware` feature.
//!
//! - [`BearerAuthLayer`] - wraps services with [`BearerAuthService`]
//! - [`BearerAuthService`] - verifies `Authorization: Bearer <token>` before
//!   forwarding the request
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tower::ServiceBuilder;
//! use ikon_auth::tower::BearerAuthLayer;
//!
//! let verifier = Arc::new(TokenVerifier::connect(&settings).await?);
//!
//! let service = ServiceBuilder::new()
//!     .layer(BearerAuthLayer::new(verifier))
//!     .service(my_http_handler);
//! ```
//!
//! ## Responses
//!
//! | Request | Outcome |
//! |---------|---------|
//! | No `Authorization` header, or not `Bearer <token>` | `401` with `WWW-Authenticate: Bearer` |
//! | Token rejected by the verifier | `403` |
//! | Token verified | forwarded, [`Claims`](crate::Claims) in extensions |
//!
//! ## Request Extensions
//!
//! ```rust,ignore
//! if let Some(claims) = req.extensions().get::<Claims>() {
//!     println!("Authenticated subject: {:?}", claims.subject());
//! }
//! ```

mod layer;
mod service;

pub use layer::BearerAuthLayer;
pub use service::{BearerAuthFuture, BearerAuthService};

use http::HeaderMap;
use http::header::AUTHORIZATION;

/// Extract the token from an `Authorization: Bearer <token>` header
///
/// The scheme is matched case-insensitively. Returns `None` when the header is
/// absent, not valid ASCII, uses another scheme, or carries an empty token.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
