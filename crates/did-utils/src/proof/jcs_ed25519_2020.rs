use multibase::Base::Base58Btc;
use serde_json::Value;

use crate::crypto::{sha256_hash::sha256_hash, CoreSign, Ed25519KeyPair, Error};

use super::{
    model::Proof,
    traits::{strip_proof, CryptoProof},
};

pub const PROOF_TYPE_JCS_ED25519_SIGNATURE_2020: &str = "JcsEd25519Signature2020";

/// The `JcsEd25519Signature2020` suite.
///
/// The proof, stripped of its signature, is embedded in the document under
/// `proof`; the JCS form of the whole is hashed with SHA-256 and signed.
/// The signature travels base58-encoded in `signatureValue`.
pub struct JcsEd25519Signature2020 {
    pub proof: Proof,
    pub key_pair: Ed25519KeyPair,
}

impl JcsEd25519Signature2020 {
    fn signing_input(proof: &Proof, payload: Value) -> Result<[u8; 32], Error> {
        let mut document = strip_proof(payload);
        let object = document.as_object_mut().ok_or(Error::InvalidProof)?;
        object.insert(
            "proof".to_string(),
            serde_json::to_value(proof).map_err(|_| Error::InvalidProof)?,
        );

        let canonical = json_canon::to_string(&document).map_err(|_| Error::InvalidProof)?;
        Ok(sha256_hash(canonical.as_bytes()))
    }

    fn normalized_proof(&self) -> Proof {
        Proof {
            proof_type: PROOF_TYPE_JCS_ED25519_SIGNATURE_2020.to_string(),
            cryptosuite: None,
            proof_value: None,
            signature_value: None,
            ..self.proof.clone()
        }
    }
}

impl CryptoProof for JcsEd25519Signature2020 {
    fn proof(&self, payload: Value) -> Result<Proof, Error> {
        let normalized_proof = Proof {
            created: self.proof.created.or_else(|| Some(chrono::Utc::now())),
            ..self.normalized_proof()
        };

        let input = Self::signing_input(&normalized_proof, payload)?;
        let signature = self.key_pair.sign(&input)?;

        Ok(Proof {
            signature_value: Some(Base58Btc.encode(signature)),
            ..normalized_proof
        })
    }

    fn verify(&self, payload: Value) -> Result<(), Error> {
        let signature_value = self.proof.signature_value.as_deref().ok_or(Error::InvalidProof)?;
        let signature = Base58Btc.decode(signature_value).map_err(|_| Error::InvalidProof)?;

        let input = Self::signing_input(&self.normalized_proof(), payload)?;
        self.key_pair.verify(&input, &signature)
    }
}
