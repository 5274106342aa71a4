//! JSON-RPC 2.0 ledger backend.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use url::Url;

use crate::{
    Address, Error, GasCoin, Ledger, Network, ObjectId, OnChainIdentity, SignedTransaction, TransactionDigest,
    TransactionStatus,
};

const GET_NETWORK: &str = "identity_getNetwork";
const GET_IDENTITY: &str = "identity_getIdentity";
const GET_GAS_COINS: &str = "identity_getGasCoins";
const EXECUTE_TRANSACTION: &str = "identity_executeTransaction";
const GET_TRANSACTION_STATUS: &str = "identity_getTransactionStatus";

pub struct RpcLedger {
    client: reqwest::Client,
    url: Url,
    network: Network,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
enum RawStatus {
    Pending,
    Executed { result: Value },
    Failed { error: String },
}

impl RpcLedger {
    /// Connects to a node, asking it for its network unless one is given.
    pub async fn connect(url: Url, network: Option<Network>) -> Result<Self, Error> {
        let mut ledger = Self {
            client: reqwest::Client::new(),
            url,
            network: network.unwrap_or_default(),
            next_id: AtomicU64::new(1),
        };

        if network.is_none() {
            let name: String = ledger.call(GET_NETWORK, json!([])).await?;
            ledger.network = name.parse()?;
        }

        tracing::info!("connected to {} ({})", ledger.url, ledger.network);
        Ok(ledger)
    }

    /// Performs a call; a missing or `null` result comes back as `Value::Null`.
    async fn call_raw(&self, method: &str, params: Value) -> Result<Value, Error> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: RpcResponse = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.error {
            Some(error) => Err(Error::Rpc(format!("{method} ({}): {}", error.code, error.message))),
            None => Ok(response.result),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, Error> {
        Ok(serde_json::from_value(self.call_raw(method, params).await?)?)
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    fn network(&self) -> Network {
        self.network
    }

    async fn get_identity(&self, id: &ObjectId) -> Result<Option<OnChainIdentity>, Error> {
        self.call(GET_IDENTITY, json!([id])).await
    }

    async fn gas_coins(&self, owner: &Address) -> Result<Vec<GasCoin>, Error> {
        self.call(GET_GAS_COINS, json!([owner])).await
    }

    async fn execute_transaction(&self, transaction: &SignedTransaction) -> Result<TransactionDigest, Error> {
        self.call(EXECUTE_TRANSACTION, json!([transaction])).await
    }

    async fn transaction_status(&self, digest: &TransactionDigest) -> Result<TransactionStatus, Error> {
        let status: RawStatus = self.call(GET_TRANSACTION_STATUS, json!([digest])).await?;
        Ok(match status {
            RawStatus::Pending => TransactionStatus::Pending,
            RawStatus::Executed { result } => TransactionStatus::Executed(result),
            RawStatus::Failed { error } => TransactionStatus::Failed(error),
        })
    }
}
