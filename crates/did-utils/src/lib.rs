//! Building blocks for ledger-anchored decentralized identities.
//!
//! This crate gathers the DID core data model, Ed25519 key material and JWKs,
//! compact JWS/JWT, Data Integrity proofs, the verifiable credential model and
//! the revocation bitmap.

pub mod crypto;
pub mod didcore;
pub mod jose;
pub mod jwk;
pub mod ldmodel;
pub mod proof;
pub mod revocation;
pub mod vc;
