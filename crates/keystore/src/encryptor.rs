pub(crate) mod chacha;
pub(crate) mod plaintext;

use async_trait::async_trait;

use crate::Error;

pub use chacha::ChaChaEncryption;
pub use plaintext::NoEncryption;

/// Abstract interface for key encryption backends.
#[async_trait]
pub trait KeyEncryption: Send + Sync {
    /// Encrypt plaintext key material.
    async fn encrypt(&self, key_material: &[u8]) -> Result<Vec<u8>, Error>;

    /// Decrypt encrypted key material.
    async fn decrypt(&self, encrypted_key: &[u8]) -> Result<Vec<u8>, Error>;
}
