//! JSON Web Keys for Ed25519 (RFC 8037 `OKP` keys).

use multibase::Base::Base64Url;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{sha256_hash::sha256_hash, Ed25519KeyPair, Error, Generate, KeyMaterial, BYTES_LENGTH_32};

pub const KEY_TYPE_OKP: &str = "OKP";
pub const CURVE_ED25519: &str = "Ed25519";

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
pub struct Jwk {
    #[serde(rename = "kid", skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(rename = "kty")]
    pub key_type: String,
    #[serde(rename = "crv")]
    pub curve: String,
    #[serde(rename = "alg", skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    pub x: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
}

impl Jwk {
    /// Returns a copy stripped of private key material.
    pub fn to_public(&self) -> Jwk {
        Jwk {
            d: None,
            ..self.clone()
        }
    }

    /// Tells whether the key carries its private half.
    pub fn is_private(&self) -> bool {
        self.d.is_some()
    }

    /// Computes the RFC 7638 thumbprint (SHA-256, base64url).
    ///
    /// Only the required members take part in the hash, so the public and
    /// private forms of a key share one thumbprint.
    pub fn thumbprint(&self) -> Result<String, Error> {
        let required = serde_json::json!({
            "crv": self.curve,
            "kty": self.key_type,
            "x": self.x,
        });
        let canonical = json_canon::to_string(&required).map_err(|_| Error::InvalidPublicKey)?;
        Ok(Base64Url.encode(sha256_hash(canonical.as_bytes())))
    }

    fn ensure_ed25519(&self) -> Result<(), Error> {
        if self.key_type != KEY_TYPE_OKP || self.curve != CURVE_ED25519 {
            return Err(Error::Unsupported);
        }
        Ok(())
    }
}

fn decode_32(value: &str, err: Error) -> Result<[u8; BYTES_LENGTH_32], Error> {
    let bytes = Base64Url.decode(value).map_err(|_| err.clone())?;
    bytes.try_into().map_err(|_| Error::InvalidKeyLength)
}

// Same as `decode_32`, with every intermediate buffer wiped on drop.
fn decode_secret(value: &str) -> Result<Zeroizing<[u8; BYTES_LENGTH_32]>, Error> {
    let bytes = Zeroizing::new(Base64Url.decode(value).map_err(|_| Error::InvalidSecretKey)?);
    let mut secret = Zeroizing::new([0u8; BYTES_LENGTH_32]);
    if bytes.len() != BYTES_LENGTH_32 {
        return Err(Error::InvalidKeyLength);
    }
    secret.copy_from_slice(&bytes);
    Ok(secret)
}

impl TryFrom<Ed25519KeyPair> for Jwk {
    type Error = Error;

    fn try_from(keypair: Ed25519KeyPair) -> Result<Self, Self::Error> {
        Jwk::try_from(&keypair)
    }
}

impl TryFrom<&Ed25519KeyPair> for Jwk {
    type Error = Error;

    fn try_from(keypair: &Ed25519KeyPair) -> Result<Self, Self::Error> {
        let d = match keypair.secret_key {
            Some(_) => {
                let secret = Zeroizing::new(keypair.private_key_bytes()?);
                Some(Base64Url.encode(&secret[..]))
            }
            None => None,
        };

        Ok(Jwk {
            key_id: None,
            key_type: KEY_TYPE_OKP.to_string(),
            curve: CURVE_ED25519.to_string(),
            algorithm: None,
            x: Base64Url.encode(keypair.public_key_bytes()?),
            d,
        })
    }
}

impl TryFrom<&Jwk> for Ed25519KeyPair {
    type Error = Error;

    fn try_from(jwk: &Jwk) -> Result<Self, Self::Error> {
        jwk.ensure_ed25519()?;

        match &jwk.d {
            Some(d) => {
                let secret = decode_secret(d)?;
                let keypair = Ed25519KeyPair::from_secret_key(&secret)?;
                // A private JWK whose halves disagree is corrupt.
                if keypair.public_key_bytes()? != decode_32(&jwk.x, Error::InvalidPublicKey)? {
                    return Err(Error::InvalidSecretKey);
                }
                Ok(keypair)
            }
            None => Ed25519KeyPair::from_public_key(&decode_32(&jwk.x, Error::InvalidPublicKey)?),
        }
    }
}

impl TryFrom<Jwk> for Ed25519KeyPair {
    type Error = Error;

    fn try_from(jwk: Jwk) -> Result<Self, Self::Error> {
        Ed25519KeyPair::try_from(&jwk)
    }
}
