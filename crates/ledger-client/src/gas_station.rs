use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::{Address, Error, ObjectId, SignedTransaction};

/// Gas reserved by a sponsor for one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasReservation {
    pub sponsor_address: Address,
    pub reservation_id: u64,
    pub gas_coins: Vec<ObjectId>,
}

/// A third party paying gas for transactions it did not send.
#[async_trait]
pub trait GasStation: Send + Sync {
    async fn reserve_gas(&self, budget: u64, duration: Duration) -> Result<GasReservation, Error>;

    /// Counter-signs and executes a transaction built on a reservation.
    ///
    /// Returns the raw execution result.
    async fn execute(&self, reservation_id: u64, transaction: &SignedTransaction) -> Result<Value, Error>;
}

/// Gas station reached over HTTP with a bearer token.
pub struct HttpGasStation {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

#[derive(Deserialize)]
struct ReserveGasResponse {
    result: Option<GasReservation>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ExecuteTxResponse {
    effects: Option<Value>,
    error: Option<String>,
}

impl HttpGasStation {
    pub fn new(base_url: Url, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            token,
        }
    }

    async fn post<T: for<'de> Deserialize<'de>>(&self, path: &str, body: Value) -> Result<T, Error> {
        let url = self
            .base_url
            .join(path)
            .map_err(|err| Error::GasStation(err.to_string()))?;

        let mut request = self.client.post(url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::GasStation(format!("{status}: {text}")));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl GasStation for HttpGasStation {
    async fn reserve_gas(&self, budget: u64, duration: Duration) -> Result<GasReservation, Error> {
        let response: ReserveGasResponse = self
            .post(
                "v1/reserve_gas",
                json!({
                    "gas_budget": budget,
                    "reserve_duration_secs": duration.as_secs(),
                }),
            )
            .await?;

        match (response.result, response.error) {
            (_, Some(error)) => Err(Error::GasStation(error)),
            (Some(reservation), None) => Ok(reservation),
            (None, None) => Err(Error::GasStation("empty reservation".to_string())),
        }
    }

    async fn execute(&self, reservation_id: u64, transaction: &SignedTransaction) -> Result<Value, Error> {
        let response: ExecuteTxResponse = self
            .post(
                "v1/execute_tx",
                json!({
                    "reservation_id": reservation_id,
                    "tx_bytes": STANDARD.encode(transaction.data.to_bytes()?),
                    "user_sig": transaction.sender_signature,
                }),
            )
            .await?;

        match (response.effects, response.error) {
            (_, Some(error)) => Err(Error::GasStation(error)),
            (Some(effects), None) => Ok(json!({ "effects": effects })),
            (None, None) => Err(Error::GasStation("no effects returned".to_string())),
        }
    }
}
