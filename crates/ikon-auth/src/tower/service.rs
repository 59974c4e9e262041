//! Tower Service for bearer token verification
//!
//! Works with any `http::Request<B>` / `http::Response<ResBody>` service
//! whose response body has a `Default` (empty) value, which is what the
//! rejection responses use.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use http::header::WWW_AUTHENTICATE;
use http::{HeaderValue, StatusCode};
use tower_service::Service;
use tracing::debug;

use crate::jwt::TokenVerifier;

use super::extract_bearer;

/// Tower Service that verifies the request's bearer token
///
/// On success the verified [`Claims`](crate::Claims) are inserted into the
/// request extensions and the request is forwarded. On failure the inner
/// service is not called.
#[derive(Debug, Clone)]
pub struct BearerAuthService<S> {
    inner: S,
    verifier: Arc<TokenVerifier>,
}

impl<S> BearerAuthService<S> {
    /// Create a new service
    pub fn new(inner: S, verifier: Arc<TokenVerifier>) -> Self {
        Self { inner, verifier }
    }

    /// Get a reference to the inner service
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get a mutable reference to the inner service
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// The verifier checking incoming tokens
    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }
}

/// Future type for [`BearerAuthService`] responses
pub type BearerAuthFuture<T, E> = BoxFuture<'static, Result<T, E>>;

fn reject<ResBody: Default>(status: StatusCode) -> http::Response<ResBody> {
    let mut response = http::Response::new(ResBody::default());
    *response.status_mut() = status;
    if status == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    response
}

impl<S, B, ResBody> Service<http::Request<B>> for BearerAuthService<S>
where
    S: Service<http::Request<B>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    B: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = S::Error;
    type Future = BearerAuthFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<B>) -> Self::Future {
        let Some(token) = extract_bearer(req.headers()) else {
            debug!(path = %req.uri().path(), "Missing or malformed bearer credentials");
            return Box::pin(async {
                Ok::<_, S::Error>(reject::<ResBody>(StatusCode::UNAUTHORIZED))
            });
        };

        let claims = match self.verifier.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(path = %req.uri().path(), reason = %e, "Bearer token rejected");
                return Box::pin(async {
                    Ok::<_, S::Error>(reject::<ResBody>(StatusCode::FORBIDDEN))
                });
            }
        };

        req.extensions_mut().insert(claims);

        // The clone is not guaranteed ready; call the instance poll_ready was driven on
        let inner = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner);
        Box::pin(async move { inner.call(req).await })
    }
}
