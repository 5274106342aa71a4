use std::sync::Arc;

use did_utils::{
    crypto::{Ed25519KeyPair, Generate},
    didcore::Document,
};

use crate::{
    Address, Error, Ledger, LedgerDid, Network, ObjectId, OnChainIdentity, TransactionData, UserSignature,
};

/// Handle on the ledger, optionally able to sign transactions.
///
/// Clients are cheap to build and are never shared between controllers.
#[derive(Clone)]
pub struct IdentityClient {
    ledger: Arc<dyn Ledger>,
    signer: Option<Ed25519KeyPair>,
}

impl IdentityClient {
    /// A client that can only read.
    pub fn read_only(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger, signer: None }
    }

    /// A client signing with the given key.
    pub fn with_signer(ledger: Arc<dyn Ledger>, signer: Ed25519KeyPair) -> Self {
        Self {
            ledger,
            signer: Some(signer),
        }
    }

    /// A client signing with a freshly generated key.
    pub fn ephemeral(ledger: Arc<dyn Ledger>) -> Result<Self, Error> {
        Ok(Self::with_signer(ledger, Ed25519KeyPair::new()?))
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn network(&self) -> Network {
        self.ledger.network()
    }

    /// Address of the signer.
    pub fn address(&self) -> Result<Address, Error> {
        let signer = self.signer.as_ref().ok_or(Error::MissingSigner)?;
        Address::from_keypair(signer)
    }

    pub fn did_for(&self, object_id: ObjectId) -> LedgerDid {
        LedgerDid::new(self.network(), object_id)
    }

    /// Parses a DID and checks it belongs to the connected network.
    pub fn parse_did(&self, did: &str) -> Result<LedgerDid, Error> {
        let parsed: LedgerDid = did.parse()?;
        if parsed.network != self.network() {
            return Err(Error::NetworkMismatch {
                expected: self.network(),
                found: parsed.network,
            });
        }
        Ok(parsed)
    }

    pub async fn get_identity(&self, did: &str) -> Result<OnChainIdentity, Error> {
        let parsed = self.parse_did(did)?;
        self.ledger
            .get_identity(&parsed.object_id)
            .await?
            .ok_or_else(|| Error::NotFound(did.to_string()))
    }

    pub async fn resolve_did(&self, did: &str) -> Result<Document, Error> {
        tracing::debug!("resolving {did}");
        Ok(self.get_identity(did).await?.document)
    }

    pub fn sign(&self, data: &TransactionData) -> Result<UserSignature, Error> {
        let signer = self.signer.as_ref().ok_or(Error::MissingSigner)?;
        UserSignature::sign(data, signer)
    }
}
