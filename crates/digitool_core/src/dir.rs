//! Data directory ownership.
//!
//! ```text
//! <data_dir>/
//! ├─ LOCK          # held exclusively by the serving process
//! └─ <database>/   # one directory per database
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

pub(crate) const LOCK_FILE: &str = "LOCK";

/// An exclusively locked data directory.
///
/// Two stores never serve the same directory: the second
/// [`DataDir::open`] fails with [`CoreError::DataDirLocked`] until the
/// first `DataDir` is dropped.
#[derive(Debug)]
pub struct DataDir {
    path: PathBuf,
    lock: File,
}

impl DataDir {
    /// Locks `path`, creating the directory first if allowed.
    ///
    /// # Errors
    ///
    /// - `NotFound` I/O error if the directory is missing and
    ///   `create_if_missing` is false
    /// - `InvalidInput` I/O error if `path` is a file
    /// - [`CoreError::DataDirLocked`] if another owner holds the lock
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(CoreError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} is not a directory", path.display()),
                )))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound && create_if_missing => {
                fs::create_dir_all(path)?;
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(CoreError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no data directory at {}", path.display()),
                )))
            }
            Err(err) => return Err(err.into()),
        }

        let lock = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        lock.try_lock_exclusive()
            .map_err(|_| CoreError::DataDirLocked)?;

        Ok(Self {
            path: path.to_path_buf(),
            lock,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DataDir {
    fn drop(&mut self) {
        let _ = self.lock.unlock();
    }
}
