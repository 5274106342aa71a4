use multibase::Base::Base64Url;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    crypto::{CoreSign, Ed25519KeyPair},
    jwk::{Jwk, CURVE_ED25519},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JwsError {
    #[error("invalid format")]
    InvalidFormat,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid signing key")]
    InvalidSigningKey,
    #[error("missing private signing key")]
    MissingSigningPrivateKey,
    #[error("signing error")]
    SigningError,
    #[error("serialization error")]
    SerializationError,
    #[error("deserialization error")]
    DeserializationError,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum JwsAlg {
    #[default]
    EdDSA,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct JwsHeader {
    /// Payload type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Signature key id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Signature algorithm
    pub alg: JwsAlg,
}

/// Issues a compact JSON Web Signature (JWS)
pub fn make_compact_jws(header: &JwsHeader, payload: &Value, jwk: &Jwk) -> Result<String, JwsError> {
    let encoded_header = {
        let header_json = serde_json::to_string(header).map_err(|_| JwsError::SerializationError)?;
        Base64Url.encode(header_json)
    };

    let encoded_payload = {
        let payload_json = serde_json::to_string(payload).map_err(|_| JwsError::SerializationError)?;
        Base64Url.encode(payload_json)
    };

    let phrase = format!("{encoded_header}.{encoded_payload}");

    match header.alg {
        JwsAlg::EdDSA => make_compact_jws_ed25519(phrase, jwk),
    }
}

fn make_compact_jws_ed25519(phrase: String, jwk: &Jwk) -> Result<String, JwsError> {
    if jwk.curve != CURVE_ED25519 {
        return Err(JwsError::InvalidSigningKey);
    }

    let keypair: Ed25519KeyPair = jwk.try_into().map_err(|_| JwsError::InvalidSigningKey)?;
    if keypair.secret_key.is_none() {
        return Err(JwsError::MissingSigningPrivateKey);
    }

    let signature = keypair.sign(phrase.as_bytes()).map_err(|_| JwsError::SigningError)?;
    let encoded_signature = Base64Url.encode(&signature);

    Ok(format!("{phrase}.{encoded_signature}"))
}

/// Splits a compact JWS into its three encoded parts.
fn split(jws: &str) -> Result<(&str, &str, &str), JwsError> {
    let mut parts = jws.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None) => Ok((header, payload, signature)),
        _ => Err(JwsError::InvalidFormat),
    }
}

fn decode_part<T: DeserializeOwned>(part: &str) -> Result<T, JwsError> {
    let bytes = Base64Url.decode(part).map_err(|_| JwsError::InvalidFormat)?;
    serde_json::from_slice(&bytes).map_err(|_| JwsError::DeserializationError)
}

/// Reads the protected header without verifying anything.
pub fn decode_header(jws: &str) -> Result<JwsHeader, JwsError> {
    let (header, _, _) = split(jws)?;
    decode_part(header)
}

/// Reads the payload without verifying the signature.
pub fn decode_payload<T: DeserializeOwned>(jws: &str) -> Result<T, JwsError> {
    let (_, payload, _) = split(jws)?;
    decode_part(payload)
}

/// Verifies a compact JSON Web Signature (JWS)
pub fn verify_compact_jws(jws: &str, jwk: &Jwk) -> Result<(), JwsError> {
    let header = decode_header(jws)?;

    match header.alg {
        JwsAlg::EdDSA => verify_compact_jws_ed25519(jws, jwk),
    }
}

fn verify_compact_jws_ed25519(jws: &str, jwk: &Jwk) -> Result<(), JwsError> {
    let (header, payload, signature) = split(jws)?;

    let phrase = format!("{header}.{payload}");
    let signature_decoded = Base64Url.decode(signature).map_err(|_| JwsError::InvalidSignature)?;

    let keypair: Ed25519KeyPair = jwk.to_public().try_into().map_err(|_| JwsError::InvalidSigningKey)?;

    keypair
        .verify(phrase.as_bytes(), &signature_decoded)
        .map_err(|_| JwsError::InvalidSignature)
}
