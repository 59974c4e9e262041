//! Common test utilities for integration tests
//!
//! A wiremock server stands in for the identity platform (discovery, JWKS and
//! token endpoints under `/platform`), and two RSA keys are generated once per
//! test binary for signing tokens.

#![allow(dead_code)]

use std::sync::LazyLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ikon_auth::{AuthSettings, KeySet};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Map, Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const DISCOVERY_PATH: &str = "/platform/.well-known/openid-configuration";
pub const JWKS_PATH: &str = "/platform/jwks";
pub const TOKEN_PATH: &str = "/platform/oauth2/token";

pub const CLIENT_ID: &str = "service-a";
pub const CLIENT_SECRET: &str = "service-a-secret";

/// First signing key, published as `kid1`
pub static KEY_ONE: LazyLock<TestKey> = LazyLock::new(|| TestKey::generate("kid1"));

/// Second signing key, published as `kid2`
pub static KEY_TWO: LazyLock<TestKey> = LazyLock::new(|| TestKey::generate("kid2"));

/// RSA key pair usable both for signing tokens and for publishing as a JWK
pub struct TestKey {
    pub kid: &'static str,
    encoding_key: EncodingKey,
    n: String,
    e: String,
}

impl TestKey {
    fn generate(kid: &'static str) -> Self {
        use rsa::pkcs8::{EncodePrivateKey, LineEnding};
        use rsa::traits::PublicKeyParts;
        use rsa::RsaPrivateKey;

        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("Failed to generate RSA key");

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("Failed to encode private key");
        let encoding_key =
            EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("Invalid RSA key");

        Self {
            kid,
            encoding_key,
            n: URL_SAFE_NO_PAD.encode(private_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(private_key.e().to_bytes_be()),
        }
    }

    /// JWK for this key with `use: sig` and its own `kid`
    pub fn jwk(&self) -> Value {
        self.jwk_with(Some(self.kid), Some("sig"))
    }

    /// JWK for this key with the given `kid` and `use` (omitted when `None`)
    pub fn jwk_with(&self, kid: Option<&str>, key_use: Option<&str>) -> Value {
        let mut jwk = Map::new();
        if let Some(kid) = kid {
            jwk.insert("kid".into(), json!(kid));
        }
        if let Some(key_use) = key_use {
            jwk.insert("use".into(), json!(key_use));
        }
        jwk.insert("kty".into(), json!("RSA"));
        jwk.insert("alg".into(), json!("RS256"));
        jwk.insert("n".into(), json!(self.n));
        jwk.insert("e".into(), json!(self.e));
        Value::Object(jwk)
    }

    /// Sign `claims` with RS256 and this key's `kid` in the header
    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.to_string());
        self.sign_with(header, claims)
    }

    /// Sign `claims` with an arbitrary header
    pub fn sign_with(&self, header: Header, claims: &Value) -> String {
        encode(&header, claims, &self.encoding_key).expect("Failed to encode test JWT")
    }
}

/// Build a key set from JWK values
pub fn key_set(keys: &[Value]) -> KeySet {
    KeySet::from_json(&json!({ "keys": keys }).to_string()).expect("Invalid test JWKS")
}

/// Flip one byte of the signature segment, keeping the token well-formed
pub fn tamper_signature(token: &str) -> String {
    let (signed, signature) = token.rsplit_once('.').expect("token has a signature");
    let mut bytes = URL_SAFE_NO_PAD.decode(signature).expect("signature is base64url");
    bytes[0] ^= 0x01;
    format!("{signed}.{}", URL_SAFE_NO_PAD.encode(bytes))
}

/// Get current Unix timestamp
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}

/// Identity platform mock server
pub struct MockPlatform {
    pub server: MockServer,
}

impl MockPlatform {
    /// Start a platform with no endpoints mounted
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base issuer URL to configure clients with
    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// Issuer the verifier expects in `iss`
    pub fn issuer(&self) -> String {
        format!("{}/platform", self.server.uri())
    }

    pub fn jwks_uri(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Settings pointing at this platform with test credentials
    pub fn settings(&self) -> AuthSettings {
        AuthSettings::new(self.base_url(), CLIENT_ID, CLIENT_SECRET)
    }

    /// Mock the discovery document, expected to be fetched exactly once
    pub async fn mock_discovery(&self) {
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": self.issuer(),
                "jwks_uri": self.jwks_uri(),
                "token_endpoint": format!("{}{}", self.server.uri(), TOKEN_PATH),
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Mock the JWKS endpoint, expected to be fetched exactly once
    pub async fn mock_jwks(&self, keys: &[Value]) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Mock a successful token grant
    pub fn token_response(access_token: &str, expires_in: u64) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": expires_in,
        }))
    }

    /// Mock a token grant answered after `delay`
    pub fn delayed_token_response(
        access_token: &str,
        expires_in: u64,
        delay: Duration,
    ) -> ResponseTemplate {
        Self::token_response(access_token, expires_in).set_delay(delay)
    }
}

/// Claims every valid test token carries
pub fn claims_for(issuer: &str, sub: &str) -> Value {
    json!({ "iss": issuer, "sub": sub })
}
