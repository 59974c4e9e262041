//! Tower Layer for bearer token verification

use std::sync::Arc;
use tower::Layer;

use crate::jwt::TokenVerifier;

use super::service::BearerAuthService;

/// Tower Layer that verifies bearer tokens before the inner service runs
///
/// # Example
///
/// ```rust,ignore
/// use tower::ServiceBuilder;
/// use ikon_auth::tower::BearerAuthLayer;
///
/// let service = ServiceBuilder::new()
///     .layer(BearerAuthLayer::new(verifier))
///     .service(my_inner_service);
/// ```
#[derive(Debug, Clone)]
pub struct BearerAuthLayer {
    verifier: Arc<TokenVerifier>,
}

impl BearerAuthLayer {
    /// Create a layer sharing the given verifier
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self { verifier }
    }

    /// The verifier used by services built from this layer
    pub fn verifier(&self) -> &Arc<TokenVerifier> {
        &self.verifier
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthService::new(inner, Arc::clone(&self.verifier))
    }
}
