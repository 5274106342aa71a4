pub(crate) mod file;
#[cfg(any(test, feature = "test-utils"))]
pub(crate) mod memory;

use async_trait::async_trait;

use crate::Error;

pub use file::FileRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryRepository;

/// Abstract interface for secret storage backends.
#[async_trait]
pub trait SecretRepository: Send + Sync {
    /// Store a given secret's bytes in the repository, replacing any previous value.
    async fn store(&self, kid: &str, key: &[u8]) -> Result<(), Error>;

    /// Retrieve a secret's bytes from the repository.
    async fn find(&self, kid: &str) -> Result<Option<Vec<u8>>, Error>;

    /// Delete a secret from the repository.
    ///
    /// Deleting a missing secret does nothing.
    async fn delete(&self, kid: &str) -> Result<(), Error>;
}
