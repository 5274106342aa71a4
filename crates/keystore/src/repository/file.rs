use std::{
    io::ErrorKind as IoErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use did_utils::crypto::sha256_hash::sha256_hash;
use tokio::fs;

use super::SecretRepository;
use crate::Error;

/// Stores each entry in its own file under a directory.
///
/// File names are the hex SHA-256 of the entry name: fixed length whatever
/// the name, and free of the slashes and colons DIDs carry.
pub struct FileRepository {
    dirpath: PathBuf,
}

impl FileRepository {
    /// Opens the directory, creating it when missing.
    pub async fn open(dirpath: impl AsRef<Path>) -> Result<Self, Error> {
        let dirpath = dirpath.as_ref().to_path_buf();
        fs::create_dir_all(&dirpath).await?;
        Ok(Self { dirpath })
    }

    fn path_for(&self, kid: &str) -> PathBuf {
        self.dirpath.join(format!("{}.bin", hex::encode(sha256_hash(kid.as_bytes()))))
    }
}

#[async_trait]
impl SecretRepository for FileRepository {
    async fn store(&self, kid: &str, key: &[u8]) -> Result<(), Error> {
        let path = self.path_for(kid);
        let staging = path.with_extension("tmp");

        // Write aside then swap, so readers never see a partial entry.
        fs::write(&staging, key).await?;
        fs::rename(&staging, &path).await?;
        Ok(())
    }

    async fn find(&self, kid: &str) -> Result<Option<Vec<u8>>, Error> {
        match fs::read(self.path_for(kid)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, kid: &str) -> Result<(), Error> {
        match fs::remove_file(self.path_for(kid)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
