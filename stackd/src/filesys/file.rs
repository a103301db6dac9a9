//! File operations

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// A file wrapper with path
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    pub async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        fs::read(&self.path).await
    }

    /// Read file as JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, crate::datastore::StoreError> {
        let contents = fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&contents)?)
    }

    /// Write bytes, creating parent directories and syncing before returning
    pub async fn write_bytes(&self, contents: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&self.path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Serialize as pretty JSON through a temporary file and rename into place
    pub async fn write_json_atomic<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<(), crate::datastore::StoreError> {
        let contents = serde_json::to_vec_pretty(value)?;
        let temp = File::new(self.path.with_extension("tmp"));
        temp.write_bytes(&contents).await?;
        fs::rename(temp.path(), &self.path).await?;
        Ok(())
    }

    /// Remove the file. Missing files are not an error.
    pub async fn delete(&self) -> std::io::Result<()> {
        match fs::remove_file(&self.path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
