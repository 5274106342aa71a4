//! Identity operations on ledger-anchored DIDs.
//!
//! The [`Connector`] ties together the key vault, the ledger facade, document
//! mutations, the transaction executor, JWT credentials and data integrity
//! proofs. Every operation builds its own ledger client; nothing is cached
//! between calls.

mod config;
mod credential;
pub mod document;
mod error;
mod executor;
mod proof;
mod signer;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use did_utils::{
    crypto::{utils::random_bytes_32, Ed25519KeyPair, Generate},
    didcore::{fragment_of, Document, MethodScope, VerificationMethod},
    proof::{Proof, ProofType},
};
use keystore::{vault_key_for, Keystore, SEED_SECRET};
use ledger_client::{GasStation, HttpGasStation, IdentityClient, Ledger, Network, OnChainIdentity, RpcLedger, Wallet};
use serde::Serialize;
use serde_json::Value;
use zeroize::Zeroizing;

pub use config::{ConnectorConfig, KeyRetention, SubjectHolderRelationship};
pub use credential::{
    validate_credential, validate_presentation, CredentialCheck, CredentialRequest, IssuedCredential,
    IssuedPresentation, PresentationCheck, ValidationError,
};
pub use error::{Error, ErrorCode, ErrorKind};
pub use executor::{PublishOptions, Published};
pub use proof::PROOF_PURPOSE_ASSERTION_METHOD;

use executor::TransactionExecutor;

/// A newly created identity.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityCreated {
    #[serde(flatten)]
    pub published: Published,
    pub document: Document,
}

/// A verification method added to a published document.
#[derive(Debug, Clone, Serialize)]
pub struct MethodAdded {
    #[serde(flatten)]
    pub published: Published,
    pub method: VerificationMethod,
}

#[derive(Clone)]
pub struct Connector {
    keystore: Keystore,
    ledger: Arc<dyn Ledger>,
    gas_station: Option<Arc<dyn GasStation>>,
    wallet: Option<Arc<dyn Wallet>>,
    config: ConnectorConfig,
}

impl Connector {
    pub fn new(keystore: Keystore, ledger: Arc<dyn Ledger>, config: ConnectorConfig) -> Self {
        Self {
            keystore,
            ledger,
            gas_station: None,
            wallet: None,
            config,
        }
    }

    pub fn with_gas_station(mut self, gas_station: Arc<dyn GasStation>) -> Self {
        self.gas_station = Some(gas_station);
        self
    }

    /// Lets direct-path signers without gas coins be funded.
    pub fn with_wallet(mut self, wallet: Arc<dyn Wallet>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    /// Connects to the configured node, gas station and vault.
    pub async fn from_config(config: ConnectorConfig) -> Result<Self, Error> {
        let rpc_url = config
            .rpc_url
            .clone()
            .ok_or_else(|| Error::general(ErrorCode::ConfigurationInvalid, "LEDGER_RPC_URL is required"))?;

        let ledger = RpcLedger::connect(rpc_url, config.network)
            .await
            .map_err(|err| Error::ledger(err, ErrorCode::ConfigurationInvalid, "could not connect to the ledger"))?;
        let keystore = Keystore::open(&config.vault_dirpath, config.vault_master_key)
            .await
            .map_err(|err| Error::vault(err, format!("could not open vault {}", config.vault_dirpath.display())))?;

        let gas_station = config
            .gas_station_url
            .clone()
            .map(|url| Arc::new(HttpGasStation::new(url, config.gas_station_token.clone())) as Arc<dyn GasStation>);

        tracing::info!("connected to {} ledger", ledger.network());
        let connector = Self::new(keystore, Arc::new(ledger), config);
        Ok(match gas_station {
            Some(gas_station) => connector.with_gas_station(gas_station),
            None => connector,
        })
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn network(&self) -> Network {
        self.ledger.network()
    }

    pub fn keystore(&self) -> &Keystore {
        &self.keystore
    }

    /// A client that can only resolve.
    pub fn read_only(&self) -> IdentityClient {
        IdentityClient::read_only(self.ledger.clone())
    }

    /// Stores the seed of a controller's ledger key, replacing any previous one.
    pub async fn set_controller_seed(&self, controller: &str, seed: &[u8; 32]) -> Result<(), Error> {
        let encoded = Zeroizing::new(hex::encode(seed));
        self.keystore
            .set_secret(&vault_key_for(controller, SEED_SECRET), &encoded)
            .await
            .map_err(|err| Error::vault(err, format!("could not store seed of {controller}")))
    }

    async fn controller_seed(&self, controller: &str) -> Result<Option<Zeroizing<Vec<u8>>>, Error> {
        let name = vault_key_for(controller, SEED_SECRET);
        let Some(encoded) = self
            .keystore
            .get_secret(&name)
            .await
            .map_err(|err| Error::vault(err, format!("could not read seed of {controller}")))?
        else {
            return Ok(None);
        };

        let encoded = Zeroizing::new(encoded);
        let seed = hex::decode(encoded.as_str()).map_err(|err| {
            Error::wrap(
                ErrorKind::General,
                ErrorCode::VaultFailure,
                err,
                format!("seed of {controller} is malformed"),
            )
        })?;
        Ok(Some(Zeroizing::new(seed)))
    }

    fn client_from_seed(&self, seed: &[u8]) -> Result<IdentityClient, Error> {
        let signer = Ed25519KeyPair::new_with_seed(seed).map_err(|err| {
            Error::wrap(
                ErrorKind::General,
                ErrorCode::ControllerSeedMissing,
                err,
                "could not derive controller key",
            )
        })?;
        Ok(IdentityClient::with_signer(self.ledger.clone(), signer))
    }

    /// A client signing for `controller`, whose seed must be in the vault.
    pub async fn for_controller(&self, controller: &str) -> Result<IdentityClient, Error> {
        let seed = self.controller_seed(controller).await?.ok_or_else(|| {
            Error::not_found(
                ErrorCode::ControllerSeedMissing,
                format!("no seed stored for controller {controller}"),
            )
        })?;
        self.client_from_seed(&seed)
    }

    fn executor<'a>(&'a self, client: &'a IdentityClient, controller: &'a str) -> TransactionExecutor<'a> {
        TransactionExecutor::new(client, &self.config, controller)
            .with_gas_station(self.gas_station.as_deref())
            .with_wallet(self.wallet.as_deref())
    }

    /// Creates an identity controlled by `controller`.
    ///
    /// A given seed replaces the stored one; without either a seed is
    /// generated and stored. The initial document only publishes an empty
    /// revocation bitmap.
    pub async fn create_identity(
        &self,
        controller: &str,
        seed: Option<[u8; 32]>,
        options: PublishOptions,
    ) -> Result<IdentityCreated, Error> {
        let seed = match seed {
            Some(seed) => Zeroizing::new(seed),
            None => match self.controller_seed(controller).await? {
                Some(stored) => Zeroizing::new(stored.as_slice().try_into().map_err(|_| {
                    Error::general(ErrorCode::VaultFailure, format!("seed of {controller} is not 32 bytes"))
                })?),
                None => Zeroizing::new(random_bytes_32().map_err(|err| {
                    Error::wrap(
                        ErrorKind::General,
                        ErrorCode::IdentityCreationFailed,
                        err,
                        "could not generate a seed",
                    )
                })?),
            },
        };
        self.set_controller_seed(controller, &seed).await?;

        let client = self.client_from_seed(seed.as_slice())?;
        let document = document::new_document(self.network());
        let published = self.executor(&client, controller).create(document, options).await?;

        let document = client.resolve_did(&published.did).await.map_err(|err| {
            Error::ledger(
                err,
                ErrorCode::IdentityCreationFailed,
                format!("could not read back {}", published.did),
            )
        })?;
        tracing::info!("created identity {} for {controller}", published.did);

        Ok(IdentityCreated { published, document })
    }

    pub async fn resolve_identity(&self, did: &str) -> Result<Document, Error> {
        self.read_only()
            .resolve_did(did)
            .await
            .map_err(|err| Error::ledger(err, ErrorCode::IdentityResolutionFailed, format!("could not resolve {did}")))
    }

    async fn load(&self, controller: &str, did: &str) -> Result<(IdentityClient, OnChainIdentity), Error> {
        let client = self.for_controller(controller).await?;
        let identity = client
            .get_identity(did)
            .await
            .map_err(|err| Error::ledger(err, ErrorCode::IdentityResolutionFailed, format!("could not resolve {did}")))?;
        Ok((client, identity))
    }

    /// Applies a synchronous mutation to the current document and publishes it.
    async fn update_document<F, R>(
        &self,
        controller: &str,
        did: &str,
        options: PublishOptions,
        mutate: F,
    ) -> Result<(Published, R), Error>
    where
        F: FnOnce(&mut Document) -> Result<R, Error>,
    {
        let (client, identity) = self.load(controller, did).await?;
        let mut document = identity.document.clone();
        let outcome = mutate(&mut document)?;
        let published = self.executor(&client, controller).update(&identity, document, options).await?;
        Ok((published, outcome))
    }

    pub async fn add_verification_method(
        &self,
        controller: &str,
        did: &str,
        scope: MethodScope,
        fragment: Option<&str>,
        options: PublishOptions,
    ) -> Result<MethodAdded, Error> {
        let (client, identity) = self.load(controller, did).await?;
        let mut document = identity.document.clone();
        let method =
            document::add_verification_method(&self.keystore, controller, &mut document, scope, fragment).await?;
        let published = self.executor(&client, controller).update(&identity, document, options).await?;

        Ok(MethodAdded { published, method })
    }

    /// Removes a method; its vault key follows the configured retention.
    pub async fn remove_verification_method(
        &self,
        controller: &str,
        did: &str,
        fragment: &str,
        options: PublishOptions,
    ) -> Result<Published, Error> {
        let (published, removed) = self
            .update_document(controller, did, options, |document| {
                document::remove_verification_method(document, fragment)
            })
            .await?;

        if self.config.key_retention == KeyRetention::Delete {
            let name = vault_key_for(controller, fragment_of(&removed.id));
            match self.keystore.delete_key(&name).await {
                Ok(()) => tracing::debug!("deleted key {name}"),
                Err(err) => tracing::warn!("method removed but key {name} could not be deleted: {err}"),
            }
        }
        Ok(published)
    }

    pub async fn add_service(
        &self,
        controller: &str,
        did: &str,
        fragment: &str,
        types: Vec<String>,
        endpoints: Vec<String>,
        options: PublishOptions,
    ) -> Result<Published, Error> {
        let (published, _) = self
            .update_document(controller, did, options, |document| {
                document::add_service(document, fragment, types, endpoints)
            })
            .await?;
        Ok(published)
    }

    pub async fn remove_service(
        &self,
        controller: &str,
        did: &str,
        fragment: &str,
        options: PublishOptions,
    ) -> Result<Published, Error> {
        let (published, _) = self
            .update_document(controller, did, options, |document| document::remove_service(document, fragment))
            .await?;
        Ok(published)
    }

    pub async fn revoke_verifiable_credentials(
        &self,
        controller: &str,
        did: &str,
        indices: &[u32],
        options: PublishOptions,
    ) -> Result<Published, Error> {
        let (published, _) = self
            .update_document(controller, did, options, |document| {
                document::revoke_credentials(document, indices)
            })
            .await?;
        tracing::info!("revoked {indices:?} on {did}");
        Ok(published)
    }

    pub async fn unrevoke_verifiable_credentials(
        &self,
        controller: &str,
        did: &str,
        indices: &[u32],
        options: PublishOptions,
    ) -> Result<Published, Error> {
        let (published, _) = self
            .update_document(controller, did, options, |document| {
                document::unrevoke_credentials(document, indices)
            })
            .await?;
        tracing::info!("unrevoked {indices:?} on {did}");
        Ok(published)
    }

    /// Issues a credential signed by the method `request.fragment` of `issuer`.
    pub async fn create_verifiable_credential(
        &self,
        controller: &str,
        issuer: &str,
        request: CredentialRequest,
    ) -> Result<IssuedCredential, Error> {
        let document = self.resolve_identity(issuer).await?;
        credential::create_credential(&self.keystore, controller, &document, request).await
    }

    /// Validates a credential against its issuer's current document.
    ///
    /// A revoked credential is not an error.
    pub async fn check_verifiable_credential(&self, jwt: &str) -> Result<CredentialCheck, Error> {
        credential::check_credential(&self.read_only(), jwt.trim()).await
    }

    pub async fn create_verifiable_presentation(
        &self,
        controller: &str,
        holder: &str,
        fragment: &str,
        credentials: Vec<String>,
        expiration_date: Option<DateTime<Utc>>,
    ) -> Result<IssuedPresentation, Error> {
        let document = self.resolve_identity(holder).await?;
        credential::create_presentation(&self.keystore, controller, &document, fragment, credentials, expiration_date)
            .await
    }

    pub async fn check_verifiable_presentation(&self, jwt: &str) -> Result<PresentationCheck, Error> {
        credential::check_presentation(&self.read_only(), jwt.trim(), self.config.subject_holder_relationship).await
    }

    pub async fn create_proof(
        &self,
        controller: &str,
        did: &str,
        fragment: &str,
        payload: &Value,
        proof_type: ProofType,
    ) -> Result<Proof, Error> {
        let document = self.resolve_identity(did).await?;
        proof::create_proof(&self.keystore, controller, &document, fragment, payload, proof_type).await
    }

    pub async fn verify_proof(&self, payload: &Value, proof: &Proof) -> Result<bool, Error> {
        proof::verify_proof(&self.read_only(), payload, proof).await
    }
}
