use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use did_utils::didcore::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{sleep, Instant};

use crate::{Address, Error, GasCoin, Network, ObjectId, SignedTransaction, TransactionDigest};

/// An identity object as stored on the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnChainIdentity {
    pub id: ObjectId,
    pub document: Document,
    /// Bumped by every accepted update.
    pub version: u64,
    /// The only account allowed to update the document.
    pub controller: Address,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionStatus {
    Pending,
    /// Included; carries the raw execution result.
    Executed(Value),
    Failed(String),
}

/// The ledger, seen as a black box.
#[async_trait]
pub trait Ledger: Send + Sync {
    fn network(&self) -> Network;

    async fn get_identity(&self, id: &ObjectId) -> Result<Option<OnChainIdentity>, Error>;

    async fn gas_coins(&self, owner: &Address) -> Result<Vec<GasCoin>, Error>;

    /// Submits a transaction without waiting for its inclusion.
    async fn execute_transaction(&self, transaction: &SignedTransaction) -> Result<TransactionDigest, Error>;

    async fn transaction_status(&self, digest: &TransactionDigest) -> Result<TransactionStatus, Error>;
}

/// Polls the ledger until the transaction lands, fails, or `timeout` elapses.
///
/// A transaction abandoned on timeout may still be included later.
pub async fn wait_for_confirmation(
    ledger: &Arc<dyn Ledger>,
    digest: &TransactionDigest,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Value, Error> {
    let deadline = Instant::now() + timeout;

    loop {
        match ledger.transaction_status(digest).await? {
            TransactionStatus::Executed(raw) => return Ok(raw),
            TransactionStatus::Failed(reason) => return Err(Error::TransactionFailed(reason)),
            TransactionStatus::Pending => {}
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(Error::ConfirmationTimeout {
                digest: digest.clone(),
                timeout,
            });
        }

        tracing::debug!("transaction {digest} pending");
        sleep(poll_interval.min(deadline - now)).await;
    }
}
