//! Temporary archive lifecycle.

use crate::error::{MigrateError, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const ARCHIVE_FILE_NAME: &str = "db.dump";

/// Uniquely named directory holding the archive for one run.
///
/// The directory is removed by [`ArchiveWorkspace::cleanup`] or, failing
/// that, when the workspace is dropped.
pub struct ArchiveWorkspace {
    dir: TempDir,
}

impl ArchiveWorkspace {
    /// Create a workspace under the system temp directory.
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("pg-migrator-").tempdir()?;
        debug!("Created archive workspace {:?}", dir.path());
        Ok(Self { dir })
    }

    /// Create a workspace under `parent`.
    pub fn create_in<P: AsRef<Path>>(parent: P) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("pg-migrator-")
            .tempdir_in(parent)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where pg_dump writes the archive.
    pub fn archive_path(&self) -> PathBuf {
        self.dir.path().join(ARCHIVE_FILE_NAME)
    }

    /// Confirm the dump produced an archive and hand it out for restore.
    pub fn seal(&self) -> Result<ArchiveHandle> {
        let path = self.archive_path();
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(ArchiveHandle {
                path,
                size: meta.len(),
            }),
            _ => Err(MigrateError::ArchiveMissing { path }),
        }
    }

    /// Remove the workspace. Failures are logged, never returned.
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!("Removed archive workspace {:?}", path),
            Err(e) => warn!("Failed to remove archive workspace {:?}: {}", path, e),
        }
    }
}

/// A completed dump archive, consumed by restore.
#[derive(Debug)]
pub struct ArchiveHandle {
    path: PathBuf,
    size: u64,
}

impl ArchiveHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Archive size in bytes when it was sealed.
    pub fn size(&self) -> u64 {
        self.size
    }
}
