//! Stack project storage
//!
//! Every stack owns one directory named after its identifier under the compose root.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::filesys::file::File;

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Location of the project directory for `folder`. Pure, performs no I/O.
    fn stack_project_path(&self, folder: &str) -> PathBuf;

    /// Write `content` as `entry_point` inside the project directory and return the
    /// project path
    async fn store_stack_file_from_bytes(
        &self,
        folder: &str,
        entry_point: &str,
        content: &[u8],
    ) -> io::Result<PathBuf>;

    async fn file_content(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Remove a project directory and everything below it. Removing a directory that
    /// does not exist succeeds.
    async fn remove_directory(&self, path: &Path) -> io::Result<()>;
}

/// Project storage on the local filesystem
#[derive(Debug, Clone)]
pub struct FsProjectStore {
    root: PathBuf,
}

impl FsProjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ProjectStore for FsProjectStore {
    fn stack_project_path(&self, folder: &str) -> PathBuf {
        self.root.join(folder)
    }

    async fn store_stack_file_from_bytes(
        &self,
        folder: &str,
        entry_point: &str,
        content: &[u8],
    ) -> io::Result<PathBuf> {
        let project_path = self.stack_project_path(folder);
        let file = File::new(project_path.join(entry_point));
        file.write_bytes(content).await?;
        debug!("Stored {} bytes at {:?}", content.len(), file.path());
        Ok(project_path)
    }

    async fn file_content(&self, path: &Path) -> io::Result<Vec<u8>> {
        File::new(path).read_bytes().await
    }

    async fn remove_directory(&self, path: &Path) -> io::Result<()> {
        match fs::remove_dir_all(path).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
