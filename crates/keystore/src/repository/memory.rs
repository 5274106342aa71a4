use std::sync::RwLock;

use async_trait::async_trait;

use super::SecretRepository;
use crate::{Error, ErrorKind};

/// In-memory repository for tests.
#[derive(Default)]
pub struct MemoryRepository {
    secrets: RwLock<Vec<(String, Vec<u8>)>>,
}

impl MemoryRepository {
    pub fn new(secrets: Vec<(String, Vec<u8>)>) -> Self {
        Self {
            secrets: RwLock::new(secrets),
        }
    }

    /// Names of the stored entries, in insertion order.
    pub fn names(&self) -> Vec<String> {
        match self.secrets.read() {
            Ok(secrets) => secrets.iter().map(|(k, _)| k.clone()).collect(),
            Err(_) => vec![],
        }
    }
}

fn poisoned() -> Error {
    Error::msg(ErrorKind::RepositoryFailure, "memory repository lock poisoned")
}

#[async_trait]
impl SecretRepository for MemoryRepository {
    async fn store(&self, kid: &str, key: &[u8]) -> Result<(), Error> {
        let mut secrets = self.secrets.write().map_err(|_| poisoned())?;
        match secrets.iter_mut().find(|(k, _)| k == kid) {
            Some((_, value)) => *value = key.to_owned(),
            None => secrets.push((kid.to_string(), key.to_owned())),
        }
        Ok(())
    }

    async fn find(&self, kid: &str) -> Result<Option<Vec<u8>>, Error> {
        let secrets = self.secrets.read().map_err(|_| poisoned())?;
        let secret = secrets.iter().find(|(k, _)| k == kid);
        Ok(secret.map(|(_, v)| v.clone()))
    }

    async fn delete(&self, kid: &str) -> Result<(), Error> {
        let mut secrets = self.secrets.write().map_err(|_| poisoned())?;
        let index = secrets.iter().position(|(k, _)| k == kid);
        if let Some(index) = index {
            secrets.remove(index);
        }
        Ok(())
    }
}
