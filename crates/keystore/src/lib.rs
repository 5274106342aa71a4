//! Vault of named Ed25519 keys and secrets.
//!
//! Keys are stored under canonical names built by [`vault_key_for`]; entries
//! go through a [`KeyEncryption`] backend before reaching a
//! [`SecretRepository`].

mod encryptor;
mod error;
mod repository;


use std::{path::Path, sync::Arc};

use did_utils::{
    crypto::{Ed25519KeyPair, Generate},
    jwk::Jwk,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub use encryptor::{ChaChaEncryption, KeyEncryption, NoEncryption};
pub use error::{Error, ErrorKind};
pub use repository::{FileRepository, SecretRepository};
#[cfg(any(test, feature = "test-utils"))]
pub use repository::MemoryRepository;

/// Name of the per-controller seed secret.
pub const SEED_SECRET: &str = "seed";

/// Canonical vault name of a controller-scoped entry: `<controller>/<fragment>`.
///
/// A leading `#` on the fragment is dropped.
pub fn vault_key_for(controller: &str, fragment: &str) -> String {
    format!("{controller}/{}", fragment.trim_start_matches('#'))
}

/// Supported key types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeyType {
    #[default]
    Ed25519,
}

/// What a vault slot holds.
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Entry {
    Key { jwk: Jwk },
    Secret { value: String },
}

#[derive(Clone)]
pub struct Keystore {
    pub(crate) repository: Arc<dyn SecretRepository>,
    pub(crate) encryptor: Arc<dyn KeyEncryption>,
}

impl Keystore {
    pub fn new<R, E>(repository: R, encryptor: E) -> Self
    where
        R: SecretRepository + 'static,
        E: KeyEncryption + 'static,
    {
        Self {
            repository: Arc::new(repository),
            encryptor: Arc::new(encryptor),
        }
    }

    /// Opens a file-backed vault, sealed with `master_key` when given.
    pub async fn open(dirpath: impl AsRef<Path>, master_key: Option<[u8; 32]>) -> Result<Self, Error> {
        let repository = FileRepository::open(dirpath).await?;
        Ok(match master_key {
            Some(master_key) => Self::new(repository, ChaChaEncryption::new(&master_key)),
            None => {
                tracing::warn!("no vault master key configured, keys are stored unencrypted");
                Self::new(repository, NoEncryption)
            }
        })
    }

    /// Creates an unencrypted in-memory vault.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Self {
        Self::new(MemoryRepository::default(), NoEncryption)
    }

    /// Swaps the encryption backend.
    pub fn with_encryptor<E>(self, encryptor: E) -> Self
    where
        E: KeyEncryption + 'static,
    {
        Self {
            repository: self.repository,
            encryptor: Arc::new(encryptor),
        }
    }

    /// Serializes, encrypts and stores a value under `kid`.
    pub async fn store<T>(&self, kid: &str, value: &T) -> Result<(), Error>
    where
        T: Serialize + ?Sized,
    {
        let bytes = serde_json::to_vec(value)?;
        let sealed = self.encryptor.encrypt(&bytes).await?;
        self.repository.store(kid, &sealed).await
    }

    /// Fetches, decrypts and deserializes the value stored under `kid`.
    pub async fn retrieve<T>(&self, kid: &str) -> Result<Option<T>, Error>
    where
        T: DeserializeOwned,
    {
        match self.repository.find(kid).await? {
            None => Ok(None),
            Some(sealed) => {
                let bytes = self.encryptor.decrypt(&sealed).await?;
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
        }
    }

    pub async fn delete(&self, kid: &str) -> Result<(), Error> {
        self.repository.delete(kid).await
    }

    /// Generates a key pair under `name` and returns its public JWK.
    ///
    /// An existing entry with the same name is replaced.
    pub async fn create_key(&self, name: &str, key_type: KeyType) -> Result<Jwk, Error> {
        let jwk: Jwk = match key_type {
            KeyType::Ed25519 => Ed25519KeyPair::new()?.try_into()?,
        };

        self.store(name, &Entry::Key { jwk: jwk.clone() }).await?;
        tracing::debug!("created {key_type:?} key {name}");

        Ok(jwk.to_public())
    }

    /// Returns the private JWK stored under `name`.
    pub async fn get_key(&self, name: &str) -> Result<Option<Jwk>, Error> {
        match self.retrieve::<Entry>(name).await? {
            None => Ok(None),
            Some(Entry::Key { jwk }) => Ok(Some(jwk)),
            Some(Entry::Secret { .. }) => Err(Error::msg(
                ErrorKind::MalformedKey,
                format!("entry {name} holds a secret, not a key"),
            )),
        }
    }

    /// Moves an entry to a new name, replacing whatever the target held.
    pub async fn rename_key(&self, old_name: &str, new_name: &str) -> Result<(), Error> {
        if old_name == new_name {
            return match self.repository.find(old_name).await? {
                Some(_) => Ok(()),
                None => Err(not_found(old_name)),
            };
        }

        let sealed = self
            .repository
            .find(old_name)
            .await?
            .ok_or_else(|| not_found(old_name))?;

        self.repository.store(new_name, &sealed).await?;
        self.repository.delete(old_name).await?;
        tracing::debug!("renamed key {old_name} to {new_name}");

        Ok(())
    }

    pub async fn delete_key(&self, name: &str) -> Result<(), Error> {
        self.delete(name).await
    }

    pub async fn get_secret(&self, name: &str) -> Result<Option<String>, Error> {
        match self.retrieve::<Entry>(name).await? {
            None => Ok(None),
            Some(Entry::Secret { value }) => Ok(Some(value)),
            Some(Entry::Key { .. }) => Err(Error::msg(
                ErrorKind::MalformedKey,
                format!("entry {name} holds a key, not a secret"),
            )),
        }
    }

    pub async fn set_secret(&self, name: &str, value: &str) -> Result<(), Error> {
        self.store(
            name,
            &Entry::Secret {
                value: value.to_string(),
            },
        )
        .await
    }
}

fn not_found(name: &str) -> Error {
    Error::msg(ErrorKind::NotFound, format!("no vault entry named {name}"))
}
