use std::time::Duration;

use thiserror::Error;

use crate::{Network, TransactionDigest};

/// Errors raised by the ledger facade.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid DID: {0}")]
    InvalidDid(String),
    #[error("invalid object id: {0}")]
    InvalidObjectId(String),
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
    #[error("DID targets network {found} but the client is connected to {expected}")]
    NetworkMismatch { expected: Network, found: Network },
    #[error("identity not found: {0}")]
    NotFound(String),
    #[error("the client has no signer")]
    MissingSigner,
    #[error("transaction rejected: {0}")]
    Rejected(String),
    #[error("transaction failed: {0}")]
    TransactionFailed(String),
    #[error("transaction {digest} not confirmed within {timeout:?}")]
    ConfirmationTimeout { digest: TransactionDigest, timeout: Duration },
    #[error("unexpected execution result (keys: [{}], gas station active: {gas_station})", keys.join(", "))]
    UnexpectedExecutionResult { keys: Vec<String>, gas_station: bool },
    #[error("gas station failure: {0}")]
    GasStation(String),
    #[error("wallet failure: {0}")]
    Wallet(String),
    #[error("rpc failure: {0}")]
    Rpc(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Crypto(#[from] did_utils::crypto::Error),
}
