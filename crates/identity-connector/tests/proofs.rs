mod common;

use did_utils::{didcore::MethodScope, proof::ProofType};
use identity_connector::{ErrorCode, ErrorKind, PROOF_PURPOSE_ASSERTION_METHOD};
use serde_json::json;

use common::{direct, identity_with_key, setup};

#[tokio::test]
async fn test_both_suites_verify() {
    let env = setup();
    let signer = identity_with_key(&env.connector, "signer", MethodScope::AssertionMethod).await;
    let payload = json!({
        "@context": ["https://www.w3.org/ns/credentials/v2"],
        "type": ["Example"],
        "name": "Alice",
        "scores": [1, 2, 3]
    });

    for proof_type in [ProofType::EdDsaJcs2022, ProofType::JcsEd25519Signature2020] {
        let proof = env
            .connector
            .create_proof("signer", &signer, "key-1", &payload, proof_type)
            .await
            .unwrap();
        assert_eq!(proof.verification_method, format!("{signer}#key-1"));
        assert_eq!(proof.proof_purpose.as_deref(), Some(PROOF_PURPOSE_ASSERTION_METHOD));
        assert_eq!(ProofType::of(&proof).unwrap(), proof_type);

        assert!(env.connector.verify_proof(&payload, &proof).await.unwrap());

        let mut modified = payload.clone();
        modified["name"] = json!("Bob");
        assert!(!env.connector.verify_proof(&modified, &proof).await.unwrap());
    }
}

#[tokio::test]
async fn test_verify_after_method_removed() {
    let env = setup();
    let signer = identity_with_key(&env.connector, "signer", MethodScope::AssertionMethod).await;
    let payload = json!({"name": "Alice"});

    let proof = env
        .connector
        .create_proof("signer", &signer, "key-1", &payload, ProofType::default())
        .await
        .unwrap();

    env.connector
        .remove_verification_method("signer", &signer, "key-1", direct())
        .await
        .unwrap();

    let err = env.connector.verify_proof(&payload, &proof).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.code(), ErrorCode::MethodMissing);
}

#[tokio::test]
async fn test_create_proof_without_key() {
    let env = setup();
    let signer = identity_with_key(&env.connector, "signer", MethodScope::AssertionMethod).await;

    let err = env
        .connector
        .create_proof("signer", &signer, "key-2", &json!({}), ProofType::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MethodMissing);

    let err = env
        .connector
        .create_proof("someone-else", &signer, "key-1", &json!({}), ProofType::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::VerificationKeyMissing);
}
