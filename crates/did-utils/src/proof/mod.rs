//! This module provides utilities for creating and verifying detached proofs.

pub mod eddsa_jcs_2022;
pub mod jcs_ed25519_2020;
pub mod model;
pub mod traits;

use std::{fmt, str::FromStr};

use multibase::Base;
use serde::{Deserialize, Serialize};

use crate::crypto::{Ed25519KeyPair, Error};

// public re-exports
pub use eddsa_jcs_2022::EdDsaJcs2022;
pub use jcs_ed25519_2020::JcsEd25519Signature2020;
pub use model::Proof;
pub use traits::CryptoProof;

/// Supported proof suites.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProofType {
    #[default]
    #[serde(rename = "eddsa-jcs-2022")]
    EdDsaJcs2022,
    #[serde(rename = "JcsEd25519Signature2020")]
    JcsEd25519Signature2020,
}

impl ProofType {
    /// Identifies the suite a received proof was made with.
    pub fn of(proof: &Proof) -> Result<Self, Error> {
        match (proof.proof_type.as_str(), proof.cryptosuite.as_deref()) {
            (eddsa_jcs_2022::PROOF_TYPE_DATA_INTEGRITY_PROOF, Some(eddsa_jcs_2022::CRYPTO_SUITE_EDDSA_JCS_2022)) => {
                Ok(ProofType::EdDsaJcs2022)
            }
            (jcs_ed25519_2020::PROOF_TYPE_JCS_ED25519_SIGNATURE_2020, _) => Ok(ProofType::JcsEd25519Signature2020),
            _ => Err(Error::Unsupported),
        }
    }

    /// Instantiates the suite around a proof template and a key.
    pub fn suite(self, proof: Proof, key_pair: Ed25519KeyPair) -> Box<dyn CryptoProof> {
        match self {
            ProofType::EdDsaJcs2022 => Box::new(EdDsaJcs2022 {
                proof,
                key_pair,
                proof_value_codec: Some(Base::Base58Btc),
            }),
            ProofType::JcsEd25519Signature2020 => Box::new(JcsEd25519Signature2020 { proof, key_pair }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProofType::EdDsaJcs2022 => eddsa_jcs_2022::CRYPTO_SUITE_EDDSA_JCS_2022,
            ProofType::JcsEd25519Signature2020 => jcs_ed25519_2020::PROOF_TYPE_JCS_ED25519_SIGNATURE_2020,
        }
    }
}

impl fmt::Display for ProofType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProofType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eddsa-jcs-2022" | "DataIntegrityProof" => Ok(ProofType::EdDsaJcs2022),
            "JcsEd25519Signature2020" | "jcs-ed25519-signature-2020" => Ok(ProofType::JcsEd25519Signature2020),
            _ => Err(Error::Unsupported),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::crypto::Generate;

    #[test]
    fn test_proof_type_dispatch() {
        let key_pair = Ed25519KeyPair::new().unwrap();
        let payload = json!({"hello": "world"});

        for proof_type in [ProofType::EdDsaJcs2022, ProofType::JcsEd25519Signature2020] {
            let template = Proof {
                verification_method: "did:iota:0x01#key-1".to_string(),
                ..Default::default()
            };
            let proof = proof_type.suite(template, key_pair.clone()).proof(payload.clone()).unwrap();
            assert_eq!(ProofType::of(&proof).unwrap(), proof_type);

            let verifier = ProofType::of(&proof).unwrap().suite(proof, key_pair.to_public());
            assert!(verifier.verify(payload.clone()).is_ok());
        }
    }

    #[test]
    fn test_proof_type_parsing() {
        assert_eq!("eddsa-jcs-2022".parse::<ProofType>().unwrap(), ProofType::EdDsaJcs2022);
        assert_eq!(
            "JcsEd25519Signature2020".parse::<ProofType>().unwrap(),
            ProofType::JcsEd25519Signature2020
        );
        assert_eq!("RsaSignature2018".parse::<ProofType>().unwrap_err(), Error::Unsupported);
    }
}
