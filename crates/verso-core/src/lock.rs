use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;

use fs2::FileExt;
use log::debug;
use verso_backend::{EngineError, NodeVersion};

use crate::config::Layout;

/// Exclusive, cross-process claim on installing one version.
///
/// Released when dropped. The lock file stays behind while the version is
/// installed and is hidden from the local catalog; removal deletes it through
/// [`InstallLock::delete_file`].
#[derive(Debug)]
pub struct InstallLock {
    file: File,
    path: PathBuf,
}

impl InstallLock {
    /// # Errors
    /// Returns [`EngineError::Locked`] if another process holds the lock, or
    /// an I/O error if the lock file cannot be opened.
    pub fn acquire(layout: &Layout, version: &NodeVersion) -> Result<Self, EngineError> {
        let versions_dir = layout.versions_dir();
        std::fs::create_dir_all(&versions_dir)
            .map_err(|error| EngineError::io_at("failed to create", &versions_dir, &error))?;

        let path = layout.lock_file(version);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|error| EngineError::io_at("failed to open lock", &path, &error))?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(error) if error.kind() == fs2::lock_contended_error().kind() => {
                return Err(EngineError::Locked {
                    version: version.clone(),
                });
            }
            Err(error) => return Err(EngineError::io_at("failed to lock", &path, &error)),
        }

        file.set_len(0)
            .and_then(|()| file.seek(SeekFrom::Start(0)).map(|_| ()))
            .and_then(|()| writeln!(file, "{}", std::process::id()))
            .map_err(|error| EngineError::io_at("failed to write lock", &path, &error))?;

        debug!("Locked {}", path.display());
        Ok(Self { file, path })
    }

    /// Releases the lock and deletes its file, once the version it guards is
    /// gone.
    pub fn delete_file(self) {
        if let Err(error) = std::fs::remove_file(&self.path) {
            debug!("Could not delete {}: {error}", self.path.display());
        }
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!("Unlocked {}", self.path.display());
    }
}
