//! Deferred removal of a stack's project directory

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::filesys::project::ProjectStore;

/// Removes a materialized project directory unless the attempt succeeds.
///
/// Error paths call [`RollbackGuard::rollback`]. A guard dropped while still armed, because
/// the request future was cancelled or a panic unwound through it, hands the removal to the
/// project store on a spawned task. Outside a tokio runtime the directory is removed in place.
pub struct RollbackGuard {
    projects: Arc<dyn ProjectStore>,
    path: PathBuf,
    armed: bool,
}

impl RollbackGuard {
    pub fn arm(projects: Arc<dyn ProjectStore>, path: impl Into<PathBuf>) -> Self {
        Self {
            projects,
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Keep the directory
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// Remove the directory. Failures are logged, never returned, so they cannot mask the
    /// error that triggered the rollback. Calling this more than once is a no-op.
    pub async fn rollback(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;

        match self.projects.remove_directory(&self.path).await {
            Ok(()) => info!("Removed project directory {:?}", self.path),
            Err(e) => error!("Unable to remove project directory {:?}: {}", self.path, e),
        }
    }
}

impl Drop for RollbackGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        warn!(
            "Deployment attempt abandoned, removing project directory {:?}",
            self.path
        );
        let path = std::mem::take(&mut self.path);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let projects = self.projects.clone();
                handle.spawn(async move {
                    if let Err(e) = projects.remove_directory(&path).await {
                        error!("Unable to remove project directory {:?}: {}", path, e);
                    }
                });
            }
            Err(_) => {
                if let Err(e) = std::fs::remove_dir_all(&path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        error!("Unable to remove project directory {:?}: {}", path, e);
                    }
                }
            }
        }
    }
}
