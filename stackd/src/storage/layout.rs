//! Storage layout configuration

use std::path::PathBuf;

use tokio::fs;

use crate::filesys::file::File;

/// Every path stackd writes to, derived from one data directory
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Metadata store snapshot
    pub fn database_file(&self) -> File {
        File::new(self.base_dir.join("stackd.json"))
    }

    /// Root of the per-stack project directories
    pub fn compose_dir(&self) -> PathBuf {
        self.base_dir.join("compose")
    }

    /// `DOCKER_CONFIG` directory holding registry credentials during a deployment
    pub fn docker_config_dir(&self) -> PathBuf {
        self.base_dir.join("docker")
    }

    /// Token signing secret generated on first start
    pub fn secret_file(&self) -> File {
        File::new(self.base_dir.join("jwt.secret"))
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Create the directories
    pub async fn setup(&self) -> std::io::Result<()> {
        for dir in [self.compose_dir(), self.docker_config_dir(), self.logs_dir()] {
            fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        #[cfg(target_os = "linux")]
        let base_dir = PathBuf::from("/var/lib/stackd");

        #[cfg(not(target_os = "linux"))]
        let base_dir = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".stackd");

        Self::new(base_dir)
    }
}
