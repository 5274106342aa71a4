use multibase::Base;
use serde_json::Value;

use crate::crypto::{sha256_hash::sha256_hash, CoreSign, Ed25519KeyPair, Error};

use super::{
    model::Proof,
    traits::{strip_proof, CryptoProof},
};

pub const CRYPTO_SUITE_EDDSA_JCS_2022: &str = "eddsa-jcs-2022";
pub const PROOF_TYPE_DATA_INTEGRITY_PROOF: &str = "DataIntegrityProof";

pub struct EdDsaJcs2022 {
    /// The proof object
    ///
    /// In a proof creation process, it does not contain the proof value, but
    ///   carries info like the verification method, challenge, nonce, etc.
    ///
    /// In a proof verification process, it contains the proof as found in the
    ///   secured document, including the proof value
    pub proof: Proof,

    /// The keypair used to create the proof: in which case the signing key must be present.
    ///
    /// The keypair used to verify the proof: in which case only the public key must be present.
    pub key_pair: Ed25519KeyPair,

    /// The proof value codec, required for proof creation.
    ///
    /// For the decoding, codec is inferred from the multibase prefix.
    pub proof_value_codec: Option<Base>,
}

impl EdDsaJcs2022 {
    fn normalized_proof(&self) -> Proof {
        Proof {
            proof_type: PROOF_TYPE_DATA_INTEGRITY_PROOF.to_string(),
            cryptosuite: Some(CRYPTO_SUITE_EDDSA_JCS_2022.to_string()),
            proof_value: None,
            signature_value: None,
            ..self.proof.clone()
        }
    }

    fn hash_data(proof: &Proof, payload: &Value) -> Result<Vec<u8>, Error> {
        let canon_proof = json_canon::to_string(proof).map_err(|_| Error::InvalidProof)?;
        let canon_doc = json_canon::to_string(payload).map_err(|_| Error::InvalidProof)?;
        Ok([sha256_hash(canon_proof.as_bytes()), sha256_hash(canon_doc.as_bytes())].concat())
    }
}

impl CryptoProof for EdDsaJcs2022 {
    fn proof(&self, payload: Value) -> Result<Proof, Error> {
        let codec = self
            .proof_value_codec
            .ok_or_else(|| Error::InvalidCall("proof_value_codec must be set for proof creation".to_string()))?;

        let normalized_proof = Proof {
            created: self.proof.created.or_else(|| Some(chrono::Utc::now())),
            ..self.normalized_proof()
        };

        let hash = Self::hash_data(&normalized_proof, &strip_proof(payload))?;
        let signature = self.key_pair.sign(&hash)?;

        Ok(Proof {
            proof_value: Some(multibase::encode(codec, signature)),
            ..normalized_proof
        })
    }

    fn verify(&self, payload: Value) -> Result<(), Error> {
        let proof_value = self.proof.proof_value.as_deref().ok_or(Error::InvalidProof)?;
        let (_, signature) = multibase::decode(proof_value).map_err(|_| Error::InvalidProof)?;

        let hash = Self::hash_data(&self.normalized_proof(), &strip_proof(payload))?;
        self.key_pair.verify(&hash, &signature)
    }
}
