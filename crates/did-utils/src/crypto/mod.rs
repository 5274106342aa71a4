//! Key material and signature primitives.

pub mod ed25519;
pub mod errors;
pub mod sha256_hash;
pub mod traits;
pub mod utils;

pub use ed25519::Ed25519KeyPair;
pub use errors::Error;
pub use traits::{CoreSign, Generate, KeyMaterial, BYTES_LENGTH_32};

/// A public key with its optional secret counterpart.
#[derive(Clone)]
pub struct AsymmetricKey<P, S> {
    pub public_key: P,
    pub secret_key: Option<S>,
}
