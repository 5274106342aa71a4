//! Drives a document transaction from preparation to an extracted DID.

use std::fmt;

use did_utils::didcore::Document;
use ledger_client::{
    wait_for_confirmation, Address, ExecutionResult, GasData, GasStation, IdentityClient, ObjectId, OnChainIdentity,
    SignedTransaction, TransactionData, TransactionKind, Wallet,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{ConnectorConfig, Error, ErrorCode};

/// How a single transaction is paid for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Let the gas station pay.
    pub sponsored: bool,
    /// Overrides the configured gas budget.
    pub gas_budget: Option<u64>,
}

impl PublishOptions {
    pub fn sponsored() -> Self {
        Self {
            sponsored: true,
            gas_budget: None,
        }
    }
}

/// Outcome of a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Published {
    pub did: String,
    pub digest: String,
    pub sponsored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Prepare,
    ReserveGas,
    Build,
    Sign,
    Submit,
    Confirm,
    ExtractResult,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Prepare => "prepare",
            Stage::ReserveGas => "reserve-gas",
            Stage::Build => "build",
            Stage::Sign => "sign",
            Stage::Submit => "submit",
            Stage::Confirm => "confirm",
            Stage::ExtractResult => "extract-result",
        })
    }
}

fn enter(stage: Stage) {
    tracing::debug!("transaction stage: {stage}");
}

pub(crate) struct TransactionExecutor<'a> {
    client: &'a IdentityClient,
    config: &'a ConnectorConfig,
    controller: &'a str,
    gas_station: Option<&'a dyn GasStation>,
    wallet: Option<&'a dyn Wallet>,
}

impl<'a> TransactionExecutor<'a> {
    pub(crate) fn new(client: &'a IdentityClient, config: &'a ConnectorConfig, controller: &'a str) -> Self {
        Self {
            client,
            config,
            controller,
            gas_station: None,
            wallet: None,
        }
    }

    pub(crate) fn with_gas_station(mut self, gas_station: Option<&'a dyn GasStation>) -> Self {
        self.gas_station = gas_station;
        self
    }

    pub(crate) fn with_wallet(mut self, wallet: Option<&'a dyn Wallet>) -> Self {
        self.wallet = wallet;
        self
    }

    /// Publishes a new identity holding `document`.
    pub(crate) async fn create(&self, document: Document, options: PublishOptions) -> Result<Published, Error> {
        self.execute(TransactionKind::CreateIdentity { document }, None, options).await
    }

    /// Replaces the document of `identity`, expecting it unchanged since it was read.
    pub(crate) async fn update(
        &self,
        identity: &OnChainIdentity,
        document: Document,
        options: PublishOptions,
    ) -> Result<Published, Error> {
        let kind = TransactionKind::UpdateDocument {
            identity: identity.id.clone(),
            document,
            expected_version: identity.version,
        };
        self.execute(kind, Some(&identity.id), options).await
    }

    async fn execute(
        &self,
        kind: TransactionKind,
        target: Option<&ObjectId>,
        options: PublishOptions,
    ) -> Result<Published, Error> {
        enter(Stage::Prepare);
        let budget = options.gas_budget.unwrap_or(self.config.gas_budget);
        let gas_station = match (options.sponsored, self.gas_station) {
            (false, _) => None,
            (true, Some(gas_station)) => Some(gas_station),
            (true, None) => {
                return Err(Error::general(
                    ErrorCode::ConfigurationInvalid,
                    "sponsored execution requested without a gas station",
                ))
            }
        };
        let sender = self
            .client
            .address()
            .map_err(|err| Error::ledger(err, ErrorCode::TransactionSigningFailed, "no controller key"))?;

        let (gas, reservation) = match gas_station {
            Some(gas_station) => {
                enter(Stage::ReserveGas);
                let reservation = gas_station
                    .reserve_gas(budget, self.config.confirmation_timeout)
                    .await
                    .map_err(|err| Error::ledger(err, ErrorCode::GasStationFailure, "could not reserve gas"))?;
                let gas = GasData {
                    owner: reservation.sponsor_address,
                    budget,
                    payment: reservation.gas_coins,
                };
                (gas, Some(reservation.reservation_id))
            }
            None => {
                let payment = self.gas_payment(&sender).await?;
                let gas = GasData {
                    owner: sender.clone(),
                    budget,
                    payment,
                };
                (gas, None)
            }
        };

        enter(Stage::Build);
        let data = TransactionData {
            sender,
            gas,
            kind,
            nonce: Uuid::new_v4().as_u64_pair().0,
        };

        enter(Stage::Sign);
        let sender_signature = self
            .client
            .sign(&data)
            .map_err(|err| Error::ledger(err, ErrorCode::TransactionSigningFailed, "could not sign transaction"))?;
        let signed = SignedTransaction {
            data,
            sender_signature,
            sponsor_signature: None,
        };

        let sponsored = gas_station.is_some();

        enter(Stage::Submit);
        let (digest, sponsored_result) = match (gas_station, reservation) {
            (Some(gas_station), Some(reservation_id)) => {
                let raw = gas_station
                    .execute(reservation_id, &signed)
                    .await
                    .map_err(|err| Error::ledger(err, ErrorCode::GasStationFailure, "gas station execution failed"))?;
                let result = ExecutionResult::from_raw(raw, true).map_err(|err| {
                    Error::ledger(err, ErrorCode::UnexpectedExecutionResult, "could not read gas station effects")
                })?;
                (result.digest().clone(), Some(result))
            }
            _ => {
                let digest = self.client.ledger().execute_transaction(&signed).await.map_err(|err| {
                    Error::ledger(err, ErrorCode::TransactionSubmissionFailed, "could not submit transaction")
                })?;
                (digest, None)
            }
        };
        tracing::info!("submitted transaction {digest}");

        enter(Stage::Confirm);
        let raw = wait_for_confirmation(
            self.client.ledger(),
            &digest,
            self.config.confirmation_timeout,
            self.config.poll_interval,
        )
        .await
        .map_err(|err| Error::ledger(err, ErrorCode::InclusionFailed, format!("transaction {digest} not included")))?;

        enter(Stage::ExtractResult);
        let result = match sponsored_result {
            Some(result) => result,
            None => ExecutionResult::from_raw(raw, sponsored).map_err(|err| {
                Error::ledger(
                    err,
                    ErrorCode::UnexpectedExecutionResult,
                    format!("could not read result of transaction {digest}"),
                )
            })?,
        };

        let object_id = match target {
            None => result.created_identity().ok_or_else(|| {
                Error::general(
                    ErrorCode::DidExtractionFailed,
                    format!("transaction {digest} created no identity (gas station active: {sponsored})"),
                )
            })?,
            Some(object_id) if result.touches(object_id) => object_id.clone(),
            Some(object_id) => {
                return Err(Error::general(
                    ErrorCode::DidExtractionFailed,
                    format!("transaction {digest} did not update {object_id} (gas station active: {sponsored})"),
                ))
            }
        };

        let did = self.client.did_for(object_id).to_string();
        tracing::info!("transaction {digest} confirmed for {did}");

        Ok(Published {
            did,
            digest: digest.to_string(),
            sponsored,
        })
    }

    /// Gas coins of the sender, topped up through the wallet when it has none.
    async fn gas_payment(&self, sender: &Address) -> Result<Vec<ObjectId>, Error> {
        let coins = self.gas_coins(sender).await?;
        if !coins.is_empty() {
            return Ok(coins);
        }

        let (Some(wallet), Some(amount)) = (self.wallet, self.config.funding_amount) else {
            return Err(Error::general(
                ErrorCode::InsufficientGas,
                format!("{sender} owns no gas coins"),
            ));
        };

        let funding_error = |err: ledger_client::Error| Error::ledger(err, ErrorCode::InsufficientGas, format!("could not fund {sender}"));
        let from = wallet
            .get_addresses(self.controller, 0, 0, 1)
            .await
            .map_err(funding_error)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::general(ErrorCode::InsufficientGas, "the wallet has no funding address"))?;
        let digest = wallet
            .transfer(self.controller, &from, sender, amount)
            .await
            .map_err(funding_error)?;
        tracing::info!("funded {sender} with {amount} from {from} in {digest}");

        let coins = self.gas_coins(sender).await?;
        if coins.is_empty() {
            return Err(Error::general(
                ErrorCode::InsufficientGas,
                format!("{sender} still owns no gas coins after funding"),
            ));
        }
        Ok(coins)
    }

    async fn gas_coins(&self, owner: &Address) -> Result<Vec<ObjectId>, Error> {
        let coins = self
            .client
            .ledger()
            .gas_coins(owner)
            .await
            .map_err(|err| Error::ledger(err, ErrorCode::InsufficientGas, format!("could not list gas coins of {owner}")))?;
        Ok(coins.into_iter().map(|coin| coin.object_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use did_utils::crypto::{Ed25519KeyPair, Generate};
    use ledger_client::{
        memory::{Confirmation, MemoryGasStation, MemoryLedger, MemoryWallet, ResultShape, GAS_FEE},
        GasReservation, Ledger, Network,
    };
    use mockall::mock;
    use serde_json::Value;

    use super::*;
    use crate::document::new_document;

    mock! {
        pub GasStation {}

        #[async_trait]
        impl GasStation for GasStation {
            async fn reserve_gas(&self, budget: u64, duration: Duration) -> Result<GasReservation, ledger_client::Error>;
            async fn execute(&self, reservation_id: u64, transaction: &SignedTransaction) -> Result<Value, ledger_client::Error>;
        }
    }

    fn config() -> ConnectorConfig {
        ConnectorConfig {
            confirmation_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        }
    }

    fn funded_client(ledger: &Arc<MemoryLedger>) -> IdentityClient {
        let signer = Ed25519KeyPair::new().unwrap();
        ledger.fund(&Address::from_keypair(&signer).unwrap(), 100 * GAS_FEE).unwrap();
        IdentityClient::with_signer(ledger.clone(), signer)
    }

    #[tokio::test]
    async fn test_direct_create_then_update() {
        let ledger = Arc::new(MemoryLedger::new(Network::Testnet).with_confirmation(Confirmation::AfterPolls(2)));
        let client = funded_client(&ledger);
        let config = config();
        let executor = TransactionExecutor::new(&client, &config, "alice");

        let published = executor
            .create(new_document(Network::Testnet), PublishOptions::default())
            .await
            .unwrap();
        assert!(published.did.starts_with("did:iota:testnet:0x"));
        assert!(!published.sponsored);

        let identity = client.get_identity(&published.did).await.unwrap();
        assert_eq!(identity.document.id, published.did);

        let mut document = identity.document.clone();
        document.also_known_as = Some(vec!["https://example.org".to_string()]);
        let updated = executor.update(&identity, document, PublishOptions::default()).await.unwrap();
        assert_eq!(updated.did, published.did);
        assert_ne!(updated.digest, published.digest);
        assert_eq!(client.get_identity(&published.did).await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_object_changes_results() {
        let ledger = Arc::new(MemoryLedger::new(Network::Devnet).with_result_shape(ResultShape::ObjectChanges));
        let client = funded_client(&ledger);
        let config = config();
        let executor = TransactionExecutor::new(&client, &config, "alice");

        let published = executor
            .create(new_document(Network::Devnet), PublishOptions::default())
            .await
            .unwrap();
        assert!(client.resolve_did(&published.did).await.is_ok());
    }

    #[tokio::test]
    async fn test_direct_submission_with_effects_result_is_not_sponsored() {
        let ledger = Arc::new(MemoryLedger::new(Network::Testnet).with_result_shape(ResultShape::Effects));
        let client = funded_client(&ledger);
        let config = config();
        let executor = TransactionExecutor::new(&client, &config, "alice");

        let published = executor
            .create(new_document(Network::Testnet), PublishOptions::default())
            .await
            .unwrap();
        assert!(!published.sponsored);
        assert!(client.resolve_did(&published.did).await.is_ok());
    }

    #[tokio::test]
    async fn test_stale_update_is_not_included() {
        let ledger = Arc::new(MemoryLedger::new(Network::Testnet));
        let client = funded_client(&ledger);
        let config = config();
        let executor = TransactionExecutor::new(&client, &config, "alice");

        let published = executor
            .create(new_document(Network::Testnet), PublishOptions::default())
            .await
            .unwrap();
        let stale = client.get_identity(&published.did).await.unwrap();
        executor
            .update(&stale, stale.document.clone(), PublishOptions::default())
            .await
            .unwrap();

        let err = executor
            .update(&stale, stale.document.clone(), PublishOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InclusionFailed);
        assert!(err.source().to_string().contains("version mismatch"));
    }

    #[tokio::test]
    async fn test_sponsored_create() {
        let ledger = Arc::new(MemoryLedger::new(Network::Testnet));
        let gas_station = MemoryGasStation::new(ledger.clone()).unwrap();
        let client = IdentityClient::with_signer(ledger.clone(), Ed25519KeyPair::new().unwrap());
        let config = config();
        let executor = TransactionExecutor::new(&client, &config, "alice").with_gas_station(Some(&gas_station));

        let published = executor
            .create(new_document(Network::Testnet), PublishOptions::sponsored())
            .await
            .unwrap();
        assert!(published.sponsored);
        assert_eq!(gas_station.executions(), 1);

        let identity = client.get_identity(&published.did).await.unwrap();
        assert_eq!(identity.controller, client.address().unwrap());
        assert_eq!(ledger.balance(&client.address().unwrap()).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sponsored_without_gas_station() {
        let ledger = Arc::new(MemoryLedger::new(Network::Testnet));
        let client = funded_client(&ledger);
        let config = config();
        let executor = TransactionExecutor::new(&client, &config, "alice");

        let err = executor
            .create(new_document(Network::Testnet), PublishOptions::sponsored())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigurationInvalid);
    }

    #[tokio::test]
    async fn test_gas_station_failure() {
        let ledger = Arc::new(MemoryLedger::new(Network::Testnet));
        let client = IdentityClient::with_signer(ledger.clone(), Ed25519KeyPair::new().unwrap());
        let config = config();

        let mut gas_station = MockGasStation::new();
        gas_station
            .expect_reserve_gas()
            .returning(|_, _| Err(ledger_client::Error::GasStation("no coins available".to_string())));
        gas_station.expect_execute().never();

        let executor = TransactionExecutor::new(&client, &config, "alice").with_gas_station(Some(&gas_station));
        let err = executor
            .create(new_document(Network::Testnet), PublishOptions::sponsored())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::GasStationFailure);
        assert_eq!(ledger.identity_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_gas() {
        let ledger = Arc::new(MemoryLedger::new(Network::Testnet));
        let client = IdentityClient::with_signer(ledger.clone(), Ed25519KeyPair::new().unwrap());
        let config = config();
        let executor = TransactionExecutor::new(&client, &config, "alice");

        let err = executor
            .create(new_document(Network::Testnet), PublishOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientGas);
    }

    #[tokio::test]
    async fn test_wallet_funds_signer() {
        let ledger = Arc::new(MemoryLedger::new(Network::Testnet));
        let wallet = MemoryWallet::new(ledger.clone());
        let client = IdentityClient::with_signer(ledger.clone(), Ed25519KeyPair::new().unwrap());
        let config = ConnectorConfig {
            funding_amount: Some(10 * GAS_FEE),
            ..config()
        };
        let executor = TransactionExecutor::new(&client, &config, "alice").with_wallet(Some(&wallet));

        executor
            .create(new_document(Network::Testnet), PublishOptions::default())
            .await
            .unwrap();

        let sender = client.address().unwrap();
        assert_eq!(wallet.transfers(), vec![(sender.clone(), 10 * GAS_FEE)]);
        assert_eq!(ledger.balance(&sender).unwrap(), 9 * GAS_FEE);
    }

    #[tokio::test]
    async fn test_confirmation_timeout() {
        let ledger = Arc::new(MemoryLedger::new(Network::Testnet).with_confirmation(Confirmation::Never));
        let client = funded_client(&ledger);
        let config = config();
        let executor = TransactionExecutor::new(&client, &config, "alice");

        let err = executor
            .create(new_document(Network::Testnet), PublishOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::TransactionConfirmationTimeout);
    }

    #[tokio::test]
    async fn test_unrecognized_result_shape() {
        let ledger = Arc::new(MemoryLedger::new(Network::Testnet).with_result_shape(ResultShape::Unrecognized));
        let client = funded_client(&ledger);
        let config = config();
        let executor = TransactionExecutor::new(&client, &config, "alice");

        let err = executor
            .create(new_document(Network::Testnet), PublishOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnexpectedExecutionResult);
        assert!(err.source().to_string().contains("keys: [digest, status]"));
        assert!(err.source().to_string().contains("gas station active: false"));

        // The identity exists even though its DID could not be read back.
        assert_eq!(ledger.identity_count().unwrap(), 1);
        assert_eq!(client.ledger().network(), Network::Testnet);
    }
}
