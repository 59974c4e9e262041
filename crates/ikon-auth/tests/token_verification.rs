//! End-to-end token verification against a mocked identity platform

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use ikon_auth::{Algorithm, TokenVerifier, VerificationError, VerificationFailure};
use jsonwebtoken::Header;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

const ISSUER: &str = "https://idp.example/platform";

fn verifier(keys: &[Value]) -> TokenVerifier {
    TokenVerifier::from_key_set(ISSUER, key_set(keys))
}

#[tokio::test]
async fn test_connect_and_verify_scenario() {
    let platform = MockPlatform::start().await;
    platform.mock_discovery().await;
    platform.mock_jwks(&[KEY_ONE.jwk()]).await;

    let verifier = TokenVerifier::connect(&platform.settings()).await.unwrap();
    assert_eq!(verifier.issuer(), platform.issuer());
    assert_eq!(verifier.key_set().key_ids().collect::<Vec<_>>(), vec!["kid1"]);

    let claims = json!({"iss": platform.issuer(), "sub": "user1"});
    let verified = verifier.verify(&KEY_ONE.sign(&claims)).unwrap();

    assert_eq!(Value::from(verified), claims);
}

#[test]
fn test_scenario_kid1_returns_exact_claims() {
    let verifier = verifier(&[KEY_ONE.jwk()]);
    let claims = json!({"iss": ISSUER, "sub": "user1"});

    let verified = verifier.verify(&KEY_ONE.sign(&claims)).unwrap();

    assert_eq!(verified.issuer(), Some(ISSUER));
    assert_eq!(verified.subject(), Some("user1"));
    assert_eq!(Value::from(verified), claims);
}

#[test]
fn test_claims_are_returned_unmodified() {
    let verifier = verifier(&[KEY_ONE.jwk(), KEY_TWO.jwk()]);
    let now = current_timestamp();
    let claims = json!({
        "iss": ISSUER,
        "sub": "user1",
        "aud": "some-other-service",
        "exp": now + 300,
        "iat": now,
        "scope": "read write",
        "realm_access": {"roles": ["admin", "user"]},
        "ratio": 0.5,
        "flag": null
    });

    let verified = verifier.verify(&KEY_TWO.sign(&claims)).unwrap();

    assert_eq!(Value::from(verified), claims);
}

#[test]
fn test_unknown_kid_is_key_resolution_failure() {
    let verifier = verifier(&[KEY_ONE.jwk()]);
    let token = KEY_TWO.sign(&claims_for(ISSUER, "user1"));

    let err = verifier.verify(&token).unwrap_err();

    assert_eq!(err.kind(), VerificationFailure::KeyResolution);
    assert!(matches!(err, VerificationError::UnknownKeyId(ref kid) if kid == "kid2"));
    assert!(err.reason().starts_with("unknown key id"));
}

#[test]
fn test_tampered_signature_is_signature_failure() {
    let verifier = verifier(&[KEY_ONE.jwk()]);
    let token = KEY_ONE.sign(&claims_for(ISSUER, "user1"));

    let err = verifier.verify(&tamper_signature(&token)).unwrap_err();

    assert_eq!(err.kind(), VerificationFailure::Signature);
}

#[test]
fn test_token_signed_by_other_key_is_rejected() {
    // kid1 in the header, but signed with the kid2 private key
    let verifier = verifier(&[KEY_ONE.jwk()]);
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some("kid1".to_string());
    let token = KEY_TWO.sign_with(header, &claims_for(ISSUER, "user1"));

    let err = verifier.verify(&token).unwrap_err();

    assert_eq!(err.kind(), VerificationFailure::Signature);
}

#[test]
fn test_wrong_issuer_fails_with_valid_signature() {
    let verifier = verifier(&[KEY_ONE.jwk()]);

    for issuer in [
        "https://evil.example/platform",
        "https://idp.example/platform/",
        "https://idp.example",
    ] {
        let token = KEY_ONE.sign(&claims_for(issuer, "user1"));
        let err = verifier.verify(&token).unwrap_err();
        assert_eq!(err.kind(), VerificationFailure::ClaimValidation, "issuer {issuer}");
        assert!(matches!(err, VerificationError::IssuerMismatch { .. }));
    }
}

#[test]
fn test_missing_issuer_is_rejected() {
    let verifier = verifier(&[KEY_ONE.jwk()]);
    let token = KEY_ONE.sign(&json!({"sub": "user1"}));

    let err = verifier.verify(&token).unwrap_err();

    assert_eq!(err.kind(), VerificationFailure::ClaimValidation);
}

#[test]
fn test_scenario_no_kid_and_no_signing_key() {
    let verifier = verifier(&[KEY_ONE.jwk_with(Some("kid1"), None)]);
    let token = KEY_ONE.sign_with(Header::new(Algorithm::RS256), &claims_for(ISSUER, "user1"));

    let err = verifier.verify(&token).unwrap_err();

    assert_eq!(err.reason(), "no signature key available");
    assert_eq!(err.kind(), VerificationFailure::KeyResolution);
}

#[test]
fn test_no_kid_uses_first_signing_key() {
    let verifier = verifier(&[
        KEY_TWO.jwk_with(Some("enc-key"), Some("enc")),
        KEY_ONE.jwk_with(None, Some("sig")),
        KEY_TWO.jwk(),
    ]);
    let claims = claims_for(ISSUER, "user1");

    let verified = verifier
        .verify(&KEY_ONE.sign_with(Header::new(Algorithm::RS256), &claims))
        .unwrap();
    assert_eq!(Value::from(verified), claims);

    // KEY_TWO is a signing key too, but not the first one
    let err = verifier
        .verify(&KEY_TWO.sign_with(Header::new(Algorithm::RS256), &claims))
        .unwrap_err();
    assert_eq!(err.kind(), VerificationFailure::Signature);
}

#[test]
fn test_duplicate_kid_last_entry_wins() {
    let verifier = verifier(&[KEY_TWO.jwk_with(Some("kid1"), Some("sig")), KEY_ONE.jwk()]);
    let claims = claims_for(ISSUER, "user1");

    assert!(verifier.verify(&KEY_ONE.sign(&claims)).is_ok());

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some("kid1".to_string());
    assert!(verifier.verify(&KEY_TWO.sign_with(header, &claims)).is_err());
}

#[test]
fn test_pss_and_larger_digests_are_accepted() {
    let verifier = verifier(&[KEY_ONE.jwk()]);
    let claims = claims_for(ISSUER, "user1");

    for alg in [Algorithm::RS384, Algorithm::RS512, Algorithm::PS256, Algorithm::PS512] {
        let mut header = Header::new(alg);
        header.kid = Some("kid1".to_string());
        let verified = verifier.verify(&KEY_ONE.sign_with(header, &claims));
        assert!(verified.is_ok(), "{alg:?}: {verified:?}");
    }
}

#[test]
fn test_algorithm_outside_allow_list_is_rejected() {
    let verifier = verifier(&[KEY_ONE.jwk()]).with_algorithms(vec![Algorithm::RS256]);
    let mut header = Header::new(Algorithm::PS256);
    header.kid = Some("kid1".to_string());

    let err = verifier
        .verify(&KEY_ONE.sign_with(header, &claims_for(ISSUER, "user1")))
        .unwrap_err();

    assert!(matches!(err, VerificationError::AlgorithmNotAllowed(ref alg) if alg == "PS256"));
}

#[test]
fn test_expired_and_immature_tokens() {
    let verifier = verifier(&[KEY_ONE.jwk()]);
    let now = current_timestamp();

    let expired = KEY_ONE.sign(&json!({"iss": ISSUER, "exp": now - 60}));
    let err = verifier.verify(&expired).unwrap_err();
    assert!(matches!(err, VerificationError::Expired));
    assert_eq!(err.kind(), VerificationFailure::ClaimValidation);

    let immature = KEY_ONE.sign(&json!({"iss": ISSUER, "nbf": now + 600}));
    let err = verifier.verify(&immature).unwrap_err();
    assert!(matches!(err, VerificationError::NotYetValid));
}

#[test]
fn test_clock_skew_tolerates_recent_expiry() {
    let verifier = verifier(&[KEY_ONE.jwk()]).with_clock_skew(Duration::from_secs(120));
    let token = KEY_ONE.sign(&json!({"iss": ISSUER, "exp": current_timestamp() - 60}));

    assert!(verifier.verify(&token).is_ok());
}

#[test]
fn test_huge_clock_skew_does_not_overflow() {
    let verifier = verifier(&[KEY_ONE.jwk()]).with_clock_skew(Duration::from_secs(u64::MAX));
    let now = current_timestamp();

    let token = KEY_ONE.sign(&json!({"iss": ISSUER, "exp": now - 60, "nbf": now + 60}));
    assert!(verifier.verify(&token).is_ok());

    let token = KEY_ONE.sign(&json!({"iss": ISSUER, "exp": now - 3 * 24 * 60 * 60}));
    assert!(matches!(verifier.verify(&token).unwrap_err(), VerificationError::Expired));
}

#[test]
fn test_malformed_claim_is_claim_failure() {
    let verifier = verifier(&[KEY_ONE.jwk()]);
    let token = KEY_ONE.sign(&json!({"iss": ISSUER, "exp": "not-a-number"}));

    let err = verifier.verify(&token).unwrap_err();

    assert!(matches!(err, VerificationError::InvalidClaim(_)), "got {err:?}");
    assert_eq!(err.kind(), VerificationFailure::ClaimValidation);
}

#[test]
fn test_malformed_tokens() {
    let verifier = verifier(&[KEY_ONE.jwk()]);

    for token in ["", "not-a-jwt", "a.b", "a.b.c.d", "%%%.e30.sig"] {
        let err = verifier.verify(token).unwrap_err();
        assert_eq!(err.kind(), VerificationFailure::Malformed, "token {token:?}");
    }
}

#[test]
fn test_verify_is_shareable_across_threads() {
    let verifier = Arc::new(verifier(&[KEY_ONE.jwk(), KEY_TWO.jwk()]));

    std::thread::scope(|scope| {
        for (i, key) in [&*KEY_ONE, &*KEY_TWO].into_iter().cycle().take(8).enumerate() {
            let verifier = Arc::clone(&verifier);
            scope.spawn(move || {
                let sub = format!("user{i}");
                let claims = claims_for(ISSUER, &sub);
                let verified = verifier.verify(&key.sign(&claims)).unwrap();
                assert_eq!(verified.subject(), Some(sub.as_str()));
            });
        }
    });
}
