//! Transaction payloads and their signatures.

use std::fmt;

use did_utils::{
    crypto::{sha256_hash::sha256_hash, CoreSign, Ed25519KeyPair, Generate, KeyMaterial},
    didcore::Document,
};
use multibase::Base::{Base58Btc, Base64Url};
use serde::{Deserialize, Serialize};

use crate::{Address, Error, ObjectId};

/// Base58 digest identifying a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionDigest(pub String);

impl fmt::Display for TransactionDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A coin able to pay for gas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasCoin {
    pub object_id: ObjectId,
    pub balance: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TransactionKind {
    /// Creates a new identity object holding `document`.
    CreateIdentity { document: Document },

    /// Replaces the document of an existing identity.
    ///
    /// The ledger rejects the update unless the identity is still at
    /// `expected_version`.
    #[serde(rename_all = "camelCase")]
    UpdateDocument {
        identity: ObjectId,
        document: Document,
        expected_version: u64,
    },
}

/// Who pays for gas, and with which coins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasData {
    pub owner: Address,
    pub budget: u64,
    pub payment: Vec<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionData {
    pub sender: Address,
    pub gas: GasData,
    pub kind: TransactionKind,
    /// Distinguishes otherwise identical transactions.
    ///
    /// Carried as a decimal string: JCS rejects integers above 2^53.
    #[serde(default, with = "u64_string")]
    pub nonce: u64,
}

mod u64_string {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        String::deserialize(deserializer)?.parse().map_err(D::Error::custom)
    }
}

impl TransactionData {
    /// Canonical (JCS) bytes, the input of every signature.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        json_canon::to_string(self)
            .map(String::into_bytes)
            .map_err(Error::Serialization)
    }

    pub fn digest(&self) -> Result<TransactionDigest, Error> {
        Ok(TransactionDigest(Base58Btc.encode(sha256_hash(&self.to_bytes()?))))
    }

    /// Whether a third party pays for gas.
    pub fn is_sponsored(&self) -> bool {
        self.gas.owner != self.sender
    }
}

/// An Ed25519 signature together with the key that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSignature {
    pub public_key: String,
    pub signature: String,
}

impl UserSignature {
    pub fn sign(data: &TransactionData, keypair: &Ed25519KeyPair) -> Result<Self, Error> {
        let signature = keypair.sign(&data.to_bytes()?)?;
        Ok(Self {
            public_key: Base64Url.encode(keypair.public_key_bytes()?),
            signature: Base64Url.encode(signature),
        })
    }

    /// Checks the signature over `data` and returns the signer's address.
    pub fn verify(&self, data: &TransactionData) -> Result<Address, Error> {
        let invalid = || Error::Rejected("malformed signature".to_string());

        let public_key: [u8; 32] = Base64Url
            .decode(&self.public_key)
            .map_err(|_| invalid())?
            .try_into()
            .map_err(|_| invalid())?;
        let signature = Base64Url.decode(&self.signature).map_err(|_| invalid())?;

        Ed25519KeyPair::from_public_key(&public_key)?
            .verify(&data.to_bytes()?, &signature)
            .map_err(|_| Error::Rejected("signature does not match transaction".to_string()))?;

        Ok(Address::from_public_key(&public_key))
    }
}

/// A transaction signed by its sender, and by its gas sponsor if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub data: TransactionData,
    pub sender_signature: UserSignature,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_signature: Option<UserSignature>,
}

impl SignedTransaction {
    /// Verifies the sender signature and, when gas is sponsored, the sponsor
    /// signature.
    pub fn verify(&self) -> Result<(), Error> {
        if self.sender_signature.verify(&self.data)? != self.data.sender {
            return Err(Error::Rejected("sender signature from another account".to_string()));
        }

        if self.data.is_sponsored() {
            let sponsor_signature = self
                .sponsor_signature
                .as_ref()
                .ok_or_else(|| Error::Rejected("missing sponsor signature".to_string()))?;
            if sponsor_signature.verify(&self.data)? != self.data.gas.owner {
                return Err(Error::Rejected("sponsor signature from another account".to_string()));
            }
        }

        Ok(())
    }
}
