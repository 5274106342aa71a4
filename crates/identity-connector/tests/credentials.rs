mod common;

use chrono::{Duration, Utc};
use did_utils::{
    crypto::{Ed25519KeyPair, Generate},
    didcore::MethodScope,
    jose::jwt,
    jwk::Jwk,
    vc::{VcClaim, CREDENTIALS_CONTEXT_V1},
};
use identity_connector::{
    ConnectorConfig, CredentialCheck, CredentialRequest, ErrorCode, ErrorKind, SubjectHolderRelationship,
};
use serde_json::json;

use common::{config, direct, identity_with_key, setup, setup_with};

fn request(subject: serde_json::Value, revocation_index: Option<u32>) -> CredentialRequest {
    CredentialRequest {
        fragment: "key-1".to_string(),
        subject,
        revocation_index,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_credential_carries_revocation_index() {
    let env = setup();
    let issuer = identity_with_key(&env.connector, "issuer", MethodScope::AssertionMethod).await;

    let issued = env
        .connector
        .create_verifiable_credential(
            "issuer",
            &issuer,
            request(json!({"@type": "Person", "name": "Alice"}), Some(5)),
        )
        .await
        .unwrap();

    let (_, claims) = jwt::decode_unverified::<VcClaim>(&issued.jwt).unwrap();
    let status = claims.claim.vc.credential_status.unwrap();
    assert_eq!(status.revocation_bitmap_index, "5");
    assert_eq!(status.id, format!("{issuer}#revocation"));
    assert_eq!(status.status_type, "RevocationBitmap2022");
}

#[tokio::test]
async fn test_create_then_check() {
    let env = setup();
    let issuer = identity_with_key(&env.connector, "issuer", MethodScope::AssertionMethod).await;
    let subject = json!({
        "@context": "https://schema.org",
        "@type": "Person",
        "id": "did:iota:testnet:0x2222222222222222222222222222222222222222222222222222222222222222",
        "name": "Alice"
    });

    let issued = env
        .connector
        .create_verifiable_credential(
            "issuer",
            &issuer,
            CredentialRequest {
                types: vec!["AlumniCredential".to_string()],
                id: Some("https://example.edu/credentials/3732".to_string()),
                ..request(subject.clone(), Some(0))
            },
        )
        .await
        .unwrap();

    let check = env.connector.check_verifiable_credential(&issued.jwt).await.unwrap();
    assert!(!check.revoked);
    let credential = check.credential.unwrap();
    assert_eq!(credential, issued.credential);
    assert_eq!(credential.issuer, issuer);
    assert_eq!(credential.cred_type, vec!["VerifiableCredential", "Person", "AlumniCredential"]);
    assert_eq!(
        credential.context,
        vec![json!(CREDENTIALS_CONTEXT_V1), json!("https://schema.org")]
    );
    assert_eq!(credential.id.as_deref(), Some("https://example.edu/credentials/3732"));

    let mut expected_subject = subject;
    expected_subject.as_object_mut().unwrap().remove("@context");
    assert_eq!(credential.credential_subject, expected_subject);
}

#[tokio::test]
async fn test_issuing_twice_with_same_inputs() {
    let env = setup();
    let issuer = identity_with_key(&env.connector, "issuer", MethodScope::AssertionMethod).await;
    let mut subject = json!({"@type": "Person", "name": "Alice"});

    let first = env
        .connector
        .create_verifiable_credential("issuer", &issuer, request(subject.clone(), None))
        .await
        .unwrap();
    let second = env
        .connector
        .create_verifiable_credential("issuer", &issuer, request(subject.clone(), None))
        .await
        .unwrap();

    subject["name"] = json!("Mallory");

    for issued in [&first, &second] {
        let check = env.connector.check_verifiable_credential(&issued.jwt).await.unwrap();
        assert_eq!(check.credential.unwrap().credential_subject["name"], "Alice");
    }
    assert_eq!(first.credential.credential_subject["name"], "Alice");
}

#[tokio::test]
async fn test_revoke_then_unrevoke() {
    let env = setup();
    let issuer = identity_with_key(&env.connector, "issuer", MethodScope::AssertionMethod).await;
    let revocable = env
        .connector
        .create_verifiable_credential("issuer", &issuer, request(json!({"name": "Alice"}), Some(5)))
        .await
        .unwrap();
    let other = env
        .connector
        .create_verifiable_credential("issuer", &issuer, request(json!({"name": "Bob"}), Some(6)))
        .await
        .unwrap();

    env.connector
        .revoke_verifiable_credentials("issuer", &issuer, &[5], direct())
        .await
        .unwrap();
    assert_eq!(
        env.connector.check_verifiable_credential(&revocable.jwt).await.unwrap(),
        CredentialCheck {
            revoked: true,
            credential: None
        }
    );
    assert!(!env.connector.check_verifiable_credential(&other.jwt).await.unwrap().revoked);

    env.connector
        .unrevoke_verifiable_credentials("issuer", &issuer, &[5], direct())
        .await
        .unwrap();
    assert!(!env.connector.check_verifiable_credential(&revocable.jwt).await.unwrap().revoked);
}

#[tokio::test]
async fn test_credential_checks_fail() {
    let env = setup();
    let issuer = identity_with_key(&env.connector, "issuer", MethodScope::AssertionMethod).await;

    let err = env
        .connector
        .create_verifiable_credential(
            "issuer",
            &issuer,
            CredentialRequest {
                fragment: "key-2".to_string(),
                ..request(json!({"name": "Alice"}), None)
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.code(), ErrorCode::MethodMissing);

    let issued = env
        .connector
        .create_verifiable_credential("issuer", &issuer, request(json!({"name": "Alice"}), None))
        .await
        .unwrap();

    // Same claims and kid, signed by a key the issuer never published.
    let (_, mut claims) = jwt::decode_unverified::<VcClaim>(&issued.jwt).unwrap();
    claims.claim.vc.credential_subject = json!({"name": "Mallory"});
    let rogue: Jwk = Ed25519KeyPair::new().unwrap().try_into().unwrap();
    let forged = jwt::encode(&claims, &jwt::key_id(&issued.jwt).unwrap(), &rogue).unwrap();
    let err = env.connector.check_verifiable_credential(&forged).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::CredentialValidationFailed);

    let err = env.connector.check_verifiable_credential("not a jwt").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::CredentialValidationFailed);

    // Rotating the signing key invalidates earlier credentials.
    env.connector
        .add_verification_method("issuer", &issuer, MethodScope::AssertionMethod, Some("key-1"), direct())
        .await
        .unwrap();
    let err = env.connector.check_verifiable_credential(&issued.jwt).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::CredentialValidationFailed);
}

async fn holder_credential(env: &common::TestEnv, subject_is_holder: bool) -> (String, String, String) {
    let issuer = identity_with_key(&env.connector, "issuer", MethodScope::AssertionMethod).await;
    let holder = identity_with_key(&env.connector, "holder", MethodScope::Authentication).await;
    let subject = match subject_is_holder {
        true => json!({"id": holder, "degree": "BSc"}),
        false => json!({"id": issuer, "degree": "BSc"}),
    };
    let credential = env
        .connector
        .create_verifiable_credential("issuer", &issuer, request(subject, Some(3)))
        .await
        .unwrap();
    (issuer, holder, credential.jwt)
}

#[tokio::test]
async fn test_presentation_round_trip() {
    let env = setup();
    let (issuer, holder, credential) = holder_credential(&env, true).await;

    let presentation = env
        .connector
        .create_verifiable_presentation(
            "holder",
            &holder,
            "key-1",
            vec![credential.clone(), credential.clone()],
            Some(Utc::now() + Duration::minutes(10)),
        )
        .await
        .unwrap();

    let check = env
        .connector
        .check_verifiable_presentation(&presentation.jwt)
        .await
        .unwrap();
    assert_eq!(check.holder, holder);
    assert_eq!(check.presentation.verifiable_credential.len(), 2);
    assert_eq!(check.credentials.len(), 2);
    for credential in &check.credentials {
        assert!(!credential.revoked);
        assert_eq!(credential.credential.as_ref().unwrap().issuer, issuer);
    }

    // A revoked credential is reported, not rejected.
    env.connector
        .revoke_verifiable_credentials("issuer", &issuer, &[3], direct())
        .await
        .unwrap();
    let check = env
        .connector
        .check_verifiable_presentation(&presentation.jwt)
        .await
        .unwrap();
    assert!(check.credentials.iter().all(|credential| credential.revoked));
}

#[tokio::test]
async fn test_subject_holder_relationship() {
    let env = setup();
    let (_, holder, credential) = holder_credential(&env, false).await;
    let presentation = env
        .connector
        .create_verifiable_presentation("holder", &holder, "key-1", vec![credential], None)
        .await
        .unwrap();

    let err = env
        .connector
        .check_verifiable_presentation(&presentation.jwt)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::General);
    assert_eq!(err.code(), ErrorCode::PresentationValidationFailed);

    let lenient = setup_with(ConnectorConfig {
        subject_holder_relationship: SubjectHolderRelationship::Any,
        ..config()
    });
    let (_, holder, credential) = holder_credential(&lenient, false).await;
    let presentation = lenient
        .connector
        .create_verifiable_presentation("holder", &holder, "key-1", vec![credential], None)
        .await
        .unwrap();
    let check = lenient
        .connector
        .check_verifiable_presentation(&presentation.jwt)
        .await
        .unwrap();
    assert_eq!(check.credentials.len(), 1);
}

#[tokio::test]
async fn test_presentation_by_other_controller() {
    let env = setup();
    let (_, holder, credential) = holder_credential(&env, true).await;

    let err = env
        .connector
        .create_verifiable_presentation("issuer", &holder, "key-1", vec![credential], None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::VerificationKeyMissing);
}
