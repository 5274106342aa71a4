//! JWT claim sets carrying verifiable credentials and presentations.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::jws::{self, JwsAlg, JwsError, JwsHeader};
use crate::jwk::Jwk;

pub const JWT_TYPE: &str = "JWT";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JwtError {
    #[error(transparent)]
    Jws(#[from] JwsError),
    #[error("the token is not yet valid")]
    NotYetValid,
    #[error("the token has expired")]
    Expired,
    #[error("missing key id in header")]
    MissingKeyId,
}

/// Registered claims shared by credential and presentation tokens, plus the
/// token-specific claim flattened alongside them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JwtClaims<T> {
    pub iss: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Not before, seconds since the epoch.
    pub nbf: i64,

    /// Expiry, seconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    #[serde(flatten)]
    pub claim: T,
}

impl<T> JwtClaims<T> {
    /// Checks the validity window against `now` (seconds since the epoch).
    pub fn check_time(&self, now: i64) -> Result<(), JwtError> {
        if self.nbf > now {
            return Err(JwtError::NotYetValid);
        }
        match self.exp {
            Some(exp) if exp <= now => Err(JwtError::Expired),
            _ => Ok(()),
        }
    }
}

/// Signs a claim set, announcing `kid` in the header.
pub fn encode<T: Serialize>(claims: &JwtClaims<T>, kid: &str, jwk: &Jwk) -> Result<String, JwtError> {
    let header = JwsHeader {
        typ: Some(JWT_TYPE.to_string()),
        kid: Some(kid.to_string()),
        alg: JwsAlg::EdDSA,
    };
    let payload: Value = serde_json::to_value(claims).map_err(|_| JwsError::SerializationError)?;

    Ok(jws::make_compact_jws(&header, &payload, jwk)?)
}

/// Decodes header and claims without verifying anything.
pub fn decode_unverified<T: DeserializeOwned>(jwt: &str) -> Result<(JwsHeader, JwtClaims<T>), JwtError> {
    let header = jws::decode_header(jwt)?;
    let claims = jws::decode_payload(jwt)?;
    Ok((header, claims))
}

/// Verifies the signature then decodes the claims.
pub fn decode_verified<T: DeserializeOwned>(jwt: &str, jwk: &Jwk) -> Result<JwtClaims<T>, JwtError> {
    jws::verify_compact_jws(jwt, jwk)?;
    Ok(jws::decode_payload(jwt)?)
}

/// Returns the `kid` header of a token.
pub fn key_id(jwt: &str) -> Result<String, JwtError> {
    jws::decode_header(jwt)?.kid.ok_or(JwtError::MissingKeyId)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::crypto::{Ed25519KeyPair, Generate};

    #[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
    struct Greeting {
        greeting: Value,
    }

    fn claims(nbf: i64, exp: Option<i64>) -> JwtClaims<Greeting> {
        JwtClaims {
            iss: "did:iota:0x01".to_string(),
            sub: None,
            jti: None,
            nbf,
            exp,
            claim: Greeting {
                greeting: json!({"hello": "world"}),
            },
        }
    }

    #[test]
    fn test_encode_then_verify() {
        let jwk: Jwk = Ed25519KeyPair::new().unwrap().try_into().unwrap();
        let jwt = encode(&claims(10, None), "did:iota:0x01#key-1", &jwk).unwrap();

        assert_eq!(key_id(&jwt).unwrap(), "did:iota:0x01#key-1");

        let (header, unverified) = decode_unverified::<Greeting>(&jwt).unwrap();
        assert_eq!(header.typ.as_deref(), Some(JWT_TYPE));
        assert_eq!(unverified, claims(10, None));

        let payload: Value = jws::decode_payload(&jwt).unwrap();
        assert_eq!(payload["greeting"], json!({"hello": "world"}));
        assert!(payload.get("exp").is_none());

        assert_eq!(decode_verified::<Greeting>(&jwt, &jwk.to_public()).unwrap(), claims(10, None));
    }

    #[test]
    fn test_verify_with_wrong_key() {
        let jwk: Jwk = Ed25519KeyPair::new().unwrap().try_into().unwrap();
        let other: Jwk = Ed25519KeyPair::new().unwrap().try_into().unwrap();
        let jwt = encode(&claims(10, None), "kid", &jwk).unwrap();

        assert_eq!(
            decode_verified::<Greeting>(&jwt, &other).unwrap_err(),
            JwtError::Jws(JwsError::InvalidSignature)
        );
    }

    #[test]
    fn test_check_time() {
        assert!(claims(10, Some(20)).check_time(15).is_ok());
        assert_eq!(claims(10, Some(20)).check_time(5), Err(JwtError::NotYetValid));
        assert_eq!(claims(10, Some(20)).check_time(20), Err(JwtError::Expired));
        assert!(claims(10, None).check_time(i64::MAX).is_ok());
    }
}
