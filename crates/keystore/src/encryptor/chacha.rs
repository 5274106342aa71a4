use async_trait::async_trait;
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Key, XChaCha20Poly1305, XNonce,
};

use crate::{Error, ErrorKind, KeyEncryption};

const NONCE_LENGTH: usize = 24;

/// XChaCha20-Poly1305 under a 32-byte master key.
///
/// Each ciphertext is prefixed with its random nonce.
pub struct ChaChaEncryption {
    cipher: XChaCha20Poly1305,
}

impl ChaChaEncryption {
    pub fn new(master_key: &[u8; 32]) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(master_key)),
        }
    }
}

#[async_trait]
impl KeyEncryption for ChaChaEncryption {
    async fn encrypt(&self, key_material: &[u8]) -> Result<Vec<u8>, Error> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, key_material)
            .map_err(|_| Error::msg(ErrorKind::EncryptionFailure, "could not seal key material"))?;

        Ok([nonce.as_slice(), &ciphertext].concat())
    }

    async fn decrypt(&self, encrypted_key: &[u8]) -> Result<Vec<u8>, Error> {
        if encrypted_key.len() < NONCE_LENGTH {
            return Err(Error::msg(ErrorKind::DecryptionFailure, "ciphertext too short"));
        }

        let (nonce, ciphertext) = encrypted_key.split_at(NONCE_LENGTH);
        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::msg(ErrorKind::DecryptionFailure, "could not open key material"))
    }
}
