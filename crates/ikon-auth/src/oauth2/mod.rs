//! OAuth2 client side: the service's own access token
//!
//! ## Submodules
//!
//! - `client_credentials` - token cache backed by the client-credentials grant

pub mod client_credentials;

pub use client_credentials::{CachedToken, ClientCredentialsCache};
