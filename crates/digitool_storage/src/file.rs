//! File-based storage backend for persistent storage.

use crate::backend::{validate_component, StorageBackend};
use crate::error::{StorageError, StorageResult};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::trace;

/// A file-based storage backend.
///
/// Namespaces are directories directly under the root and artifacts are
/// files inside them:
///
/// ```text
/// <root>/
/// └─ <namespace>/
///    └─ <name>
/// ```
///
/// # Durability
///
/// `write` uses the write-then-rename pattern:
/// 1. Write to a hidden temporary file next to the target
/// 2. Sync the temporary file to disk (if `sync` is enabled)
/// 3. Rename the temporary file over the target
/// 4. Fsync the namespace directory so the rename is durable
///
/// # Thread Safety
///
/// The backend holds no mutable state; callers serialize writes to the
/// same artifact (DigitoolDB does this per collection).
///
/// # Example
///
/// ```no_run
/// use digitool_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("data"), true).unwrap();
/// backend.create_namespace("shop").unwrap();
/// backend.write("shop", "users.json", b"[]").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    sync: bool,
}

impl FileBackend {
    /// Opens a file backend rooted at `root`, creating the directory if
    /// needed.
    ///
    /// When `sync` is true every write is fsynced before it is renamed
    /// into place.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be created or is not a directory.
    pub fn open(root: &Path, sync: bool) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        if !root.is_dir() {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("storage root is not a directory: {}", root.display()),
            )));
        }

        Ok(Self {
            root: root.to_path_buf(),
            sync,
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the on-disk path of an artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if either component is invalid.
    pub fn artifact_path(&self, namespace: &str, name: &str) -> StorageResult<PathBuf> {
        Ok(self.namespace_path(namespace)?.join(checked(name)?))
    }

    fn namespace_path(&self, namespace: &str) -> StorageResult<PathBuf> {
        Ok(self.root.join(checked(namespace)?))
    }

    /// Syncs a directory so that renames and deletions inside it are durable.
    #[cfg(unix)]
    fn sync_directory(&self, dir: &Path) -> StorageResult<()> {
        if self.sync {
            File::open(dir)?.sync_all()?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self, _dir: &Path) -> StorageResult<()> {
        // NTFS journals metadata; directory handles cannot be fsynced
        Ok(())
    }
}

fn checked(component: &str) -> StorageResult<&str> {
    validate_component(component)?;
    Ok(component)
}

fn not_found_as_none<T>(result: io::Result<T>) -> StorageResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn sorted_entries(dir: &Path, want_dirs: bool) -> StorageResult<Vec<String>> {
    let Some(entries) = not_found_as_none(fs::read_dir(dir))? else {
        return Ok(Vec::new());
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() != want_dirs {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if validate_component(&name).is_ok() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

impl StorageBackend for FileBackend {
    fn read(&self, namespace: &str, name: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.artifact_path(namespace, name)?;
        not_found_as_none(fs::read(path))
    }

    fn write(&self, namespace: &str, name: &str, data: &[u8]) -> StorageResult<()> {
        let dir = self.namespace_path(namespace)?;
        let target = dir.join(checked(name)?);
        if !dir.is_dir() {
            return Err(StorageError::MissingNamespace(namespace.to_string()));
        }

        let temp = dir.join(format!(".{name}.tmp"));
        let result = (|| {
            let mut file = File::create(&temp)?;
            file.write_all(data)?;
            if self.sync {
                file.sync_all()?;
            }
            drop(file);
            fs::rename(&temp, &target)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        self.sync_directory(&dir)?;
        trace!(path = %target.display(), bytes = data.len(), "artifact written");
        Ok(())
    }

    fn remove(&self, namespace: &str, name: &str) -> StorageResult<bool> {
        let path = self.artifact_path(namespace, name)?;
        let removed = not_found_as_none(fs::remove_file(&path))?.is_some();
        if removed {
            if let Some(dir) = path.parent() {
                self.sync_directory(dir)?;
            }
        }
        Ok(removed)
    }

    fn list(&self, namespace: &str) -> StorageResult<Vec<String>> {
        sorted_entries(&self.namespace_path(namespace)?, false)
    }

    fn create_namespace(&self, namespace: &str) -> StorageResult<bool> {
        let dir = self.namespace_path(namespace)?;
        match fs::create_dir(&dir) {
            Ok(()) => {
                self.sync_directory(&self.root)?;
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_namespace(&self, namespace: &str) -> StorageResult<bool> {
        let dir = self.namespace_path(namespace)?;
        let removed = not_found_as_none(fs::remove_dir_all(&dir))?.is_some();
        if removed {
            self.sync_directory(&self.root)?;
        }
        Ok(removed)
    }

    fn namespace_exists(&self, namespace: &str) -> StorageResult<bool> {
        Ok(self.namespace_path(namespace)?.is_dir())
    }

    fn list_namespaces(&self) -> StorageResult<Vec<String>> {
        sorted_entries(&self.root, true)
    }
}
