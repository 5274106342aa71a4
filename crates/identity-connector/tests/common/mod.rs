#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use did_utils::didcore::{fragment_of, Document, MethodScope};
use identity_connector::{Connector, ConnectorConfig, PublishOptions};
use keystore::Keystore;
use ledger_client::{
    memory::{MemoryGasStation, MemoryLedger, MemoryWallet, GAS_FEE},
    Network,
};

pub struct TestEnv {
    pub ledger: Arc<MemoryLedger>,
    pub gas_station: Arc<MemoryGasStation>,
    pub wallet: Arc<MemoryWallet>,
    pub connector: Connector,
}

pub fn config() -> ConnectorConfig {
    ConnectorConfig {
        confirmation_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(5),
        funding_amount: Some(10 * GAS_FEE),
        ..Default::default()
    }
}

pub fn setup() -> TestEnv {
    setup_with(config())
}

pub fn setup_with(config: ConnectorConfig) -> TestEnv {
    let ledger = Arc::new(MemoryLedger::new(Network::Testnet));
    let gas_station = Arc::new(MemoryGasStation::new(ledger.clone()).unwrap());
    let wallet = Arc::new(MemoryWallet::new(ledger.clone()));

    let connector = Connector::new(Keystore::in_memory(), ledger.clone(), config)
        .with_gas_station(gas_station.clone())
        .with_wallet(wallet.clone());

    TestEnv {
        ledger,
        gas_station,
        wallet,
        connector,
    }
}

pub fn direct() -> PublishOptions {
    PublishOptions::default()
}

/// Creates an identity with a `key-1` method in `scope`.
pub async fn identity_with_key(connector: &Connector, controller: &str, scope: MethodScope) -> String {
    let did = connector
        .create_identity(controller, None, direct())
        .await
        .unwrap()
        .published
        .did;
    connector
        .add_verification_method(controller, &did, scope, Some("key-1"), direct())
        .await
        .unwrap();
    did
}

/// Methods as (fragment, scope), sorted.
pub fn method_outline(document: &Document) -> Vec<(String, MethodScope)> {
    let mut outline: Vec<(String, MethodScope)> = document
        .methods()
        .into_iter()
        .map(|method| {
            let (_, scope) = document.find_method(&method.id).unwrap();
            (fragment_of(&method.id).to_string(), scope)
        })
        .collect();
    outline.sort_by(|a, b| a.0.cmp(&b.0));
    outline
}

/// Services with their DID stripped from the id.
pub fn service_outline(document: &Document) -> Vec<serde_json::Value> {
    document
        .services()
        .iter()
        .map(|service| {
            let mut value = serde_json::to_value(service).unwrap();
            value["id"] = fragment_of(&service.id).into();
            value
        })
        .collect()
}
