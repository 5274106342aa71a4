//! Facade over the ledger anchoring `did:iota` identities.
//!
//! The ledger itself is a black box behind [`Ledger`]; this crate adds DID
//! and network handling, transaction payloads and signatures, decoding of
//! execution results, gas sponsorship and the single confirmation loop.

mod client;
mod error;
mod gas_station;
mod ledger;
mod network;
mod result;
mod rpc;
mod transaction;
mod wallet;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use client::IdentityClient;
pub use error::Error;
pub use gas_station::{GasReservation, GasStation, HttpGasStation};
pub use ledger::{wait_for_confirmation, Ledger, OnChainIdentity, TransactionStatus};
pub use network::{Address, LedgerDid, Network, ObjectId, DID_METHOD};
pub use result::{CreatedObject, DirectResult, ExecutionResult, GasStationResult, ObjectChange};
pub use rpc::RpcLedger;
pub use transaction::{
    GasCoin, GasData, SignedTransaction, TransactionData, TransactionDigest, TransactionKind, UserSignature,
};
pub use wallet::Wallet;
