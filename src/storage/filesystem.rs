use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use super::traits::{ImmutableStore, MutableState, StorageBackend};
use crate::error::{Error, Result};
use crate::hash::Hash;

/// Write `content` to `path` via a temp file in `dir` + rename, so readers
/// see either the old or the new file.
pub(crate) fn write_atomic(dir: &Path, path: &Path, content: &[u8]) -> Result<()> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Exclusive lock held as a file created with `create_new`; the file is
/// removed when the lock is dropped. Works across processes sharing a
/// directory.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Take the lock, or `None` if another holder has the file.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let lock = LockFile {
            path: path.to_path_buf(),
        };
        writeln!(file, "{}", std::process::id())?;
        Ok(Some(lock))
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("failed to release lock {:?}: {}", self.path, e);
        }
    }
}

/// Filesystem-based storage backend using SHA-256 content addressing
///
/// Layout:
/// - `objects/<hex>`: canonical object bytes, keyed by their hash
/// - `state.yaml`: the mutable state document
pub struct FilesystemStorage {
    base_path: PathBuf,
    /// Serializes read-modify-write cycles on the state file
    state_lock: Mutex<()>,
}

impl FilesystemStorage {
    /// Create a new filesystem storage backend
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        Ok(FilesystemStorage {
            base_path: base_path.as_ref().to_path_buf(),
            state_lock: Mutex::new(()),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the path to the objects directory
    fn objects_dir(&self) -> PathBuf {
        self.base_path.join("objects")
    }

    fn object_path(&self, id: &Hash) -> PathBuf {
        self.objects_dir().join(id.to_hex())
    }

    /// Get the path to the state file
    fn state_path(&self) -> PathBuf {
        self.base_path.join("state.yaml")
    }

    fn read_state_unlocked<T: DeserializeOwned + Default>(&self) -> Result<T> {
        let state_path = self.state_path();
        if state_path.exists() {
            let content = fs::read_to_string(&state_path)?;
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Ok(T::default())
        }
    }

    fn write_state_unlocked<T: Serialize>(&self, state: &T) -> Result<()> {
        let yaml = serde_yaml::to_string(state)?;
        write_atomic(&self.base_path, &self.state_path(), yaml.as_bytes())
    }
}

impl ImmutableStore for FilesystemStorage {
    fn write_object(&self, content: &[u8]) -> Result<Hash> {
        let hash = Hash::digest(content);
        let path = self.object_path(&hash);

        // Only write if doesn't exist (immutable)
        if !path.exists() {
            write_atomic(&self.objects_dir(), &path, content)?;
            tracing::debug!("stored object {} ({} bytes)", hash.short(), content.len());
        }

        Ok(hash)
    }

    fn read_object(&self, id: &Hash) -> Result<Vec<u8>> {
        match fs::read(self.object_path(id)) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::ObjectNotFound(*id)),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_object(&self, id: &Hash) -> Result<()> {
        let path = self.object_path(id);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn object_exists(&self, id: &Hash) -> Result<bool> {
        Ok(self.object_path(id).exists())
    }
}

impl<T> MutableState<T> for FilesystemStorage
where
    T: Serialize + DeserializeOwned + Default,
{
    fn read_state(&self) -> Result<T> {
        let _guard = self.state_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read_state_unlocked()
    }

    fn write_state(&self, state: &T) -> Result<()> {
        let _guard = self.state_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.write_state_unlocked(state)
    }

    fn update_state<F, R>(&self, update_fn: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> Result<R>,
    {
        let _guard = self.state_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut state: T = self.read_state_unlocked()?;
        let result = update_fn(&mut state)?;
        self.write_state_unlocked(&state)?;

        Ok(result)
    }
}

impl<T> StorageBackend<T> for FilesystemStorage
where
    T: Serialize + DeserializeOwned + Default,
{
    fn initialize(&self) -> Result<()> {
        fs::create_dir_all(self.objects_dir())?;
        Ok(())
    }
}
