//! Detached data integrity proofs over arbitrary JSON documents.

use did_utils::{
    crypto::{Ed25519KeyPair, Error as CryptoError},
    didcore::Document,
    proof::{Proof, ProofType},
};
use keystore::Keystore;
use ledger_client::IdentityClient;
use serde_json::Value;

use crate::{credential::now, signer::TransientKeyStore, Error, ErrorCode, ErrorKind};

pub const PROOF_PURPOSE_ASSERTION_METHOD: &str = "assertionMethod";

/// Signs `payload` with the method `fragment` of `signer`.
///
/// A `proof` entry already on the payload is not covered by the new proof.
pub(crate) async fn create_proof(
    keystore: &Keystore,
    controller: &str,
    signer: &Document,
    fragment: &str,
    payload: &Value,
    proof_type: ProofType,
) -> Result<Proof, Error> {
    let store = TransientKeyStore::load(keystore, controller, signer, fragment).await?;
    let key_pair = store
        .keypair()
        .map_err(|err| Error::wrap(ErrorKind::General, ErrorCode::ProofCreationFailed, err, "unusable signing key"))?;

    let template = Proof {
        proof_type: proof_type.to_string(),
        proof_purpose: Some(PROOF_PURPOSE_ASSERTION_METHOD.to_string()),
        verification_method: store.kid().to_string(),
        created: Some(now()),
        ..Default::default()
    };

    let proof = proof_type
        .suite(template, key_pair)
        .proof(payload.clone())
        .map_err(|err| Error::wrap(ErrorKind::General, ErrorCode::ProofCreationFailed, err, "could not sign payload"))?;
    tracing::debug!("created {proof_type} proof with {}", proof.verification_method);

    Ok(proof)
}

/// Checks a proof against the current document of its verification method.
///
/// A signature that does not match yields `false`; a missing method, a key
/// that cannot verify or an unreadable proof are errors.
pub(crate) async fn verify_proof(client: &IdentityClient, payload: &Value, proof: &Proof) -> Result<bool, Error> {
    let did = proof
        .verification_method
        .split('#')
        .next()
        .unwrap_or_default();
    let document = client.resolve_did(did).await.map_err(|err| {
        Error::ledger(err, ErrorCode::IdentityResolutionFailed, format!("could not resolve {did}"))
    })?;

    let (method, _) = document.find_method(&proof.verification_method).ok_or_else(|| {
        Error::not_found(
            ErrorCode::MethodMissing,
            format!("{} is not a verification method of {did}", proof.verification_method),
        )
    })?;
    let jwk = method.public_key_jwk.as_ref().ok_or_else(|| {
        Error::general(
            ErrorCode::ProofVerificationFailed,
            format!("{} has no usable public key", method.id),
        )
    })?;
    let key_pair = Ed25519KeyPair::try_from(jwk).map_err(|err| {
        Error::wrap(
            ErrorKind::General,
            ErrorCode::ProofVerificationFailed,
            err,
            format!("{} has no usable public key", method.id),
        )
    })?;

    let proof_type = ProofType::of(proof).map_err(|err| {
        Error::wrap(
            ErrorKind::General,
            ErrorCode::InvalidInput,
            err,
            format!("unsupported proof type {}", proof.proof_type),
        )
    })?;

    match proof_type.suite(proof.clone(), key_pair).verify(payload.clone()) {
        Ok(()) => Ok(true),
        Err(CryptoError::VerificationError) => {
            tracing::debug!("proof by {} does not match the payload", proof.verification_method);
            Ok(false)
        }
        Err(err) => Err(Error::wrap(
            ErrorKind::General,
            ErrorCode::ProofVerificationFailed,
            err,
            "malformed proof",
        )),
    }
}
