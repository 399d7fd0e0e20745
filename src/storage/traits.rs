use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::hash::Hash;

/// Trait for immutable, content-addressed storage operations
pub trait ImmutableStore {
    /// Write content and return its hash.
    /// If content already exists, returns the hash without writing.
    fn write_object(&self, content: &[u8]) -> Result<Hash>;

    /// Write multiple objects in a batch operation.
    /// Returns hashes in the same order as inputs.
    fn write_objects(&self, contents: &[&[u8]]) -> Result<Vec<Hash>> {
        contents
            .iter()
            .map(|content| self.write_object(content))
            .collect()
    }

    /// Read object bytes by hash.
    /// Returns `Error::ObjectNotFound` if the object doesn't exist.
    fn read_object(&self, id: &Hash) -> Result<Vec<u8>>;

    /// Read multiple objects in a batch operation, in the order requested.
    fn read_objects(&self, ids: &[Hash]) -> Result<Vec<Vec<u8>>> {
        ids.iter().map(|id| self.read_object(id)).collect()
    }

    /// Delete object by hash.
    /// Returns Ok(()) even if object didn't exist.
    fn delete_object(&self, id: &Hash) -> Result<()>;

    /// Check if object exists by hash.
    fn object_exists(&self, id: &Hash) -> Result<bool>;
}

/// Trait for mutable state management
pub trait MutableState<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Read the current state.
    /// Returns default state if none exists.
    fn read_state(&self) -> Result<T>;

    /// Atomically write new state.
    fn write_state(&self, state: &T) -> Result<()>;

    /// Atomically update state using a closure.
    ///
    /// The closure's result is returned. If the closure fails, nothing is
    /// written. Concurrent callers within one process are serialized.
    fn update_state<F, R>(&self, update_fn: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> Result<R>;
}

/// Combined storage backend trait
pub trait StorageBackend<T>: ImmutableStore + MutableState<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Initialize storage (create directories, verify access, etc.)
    fn initialize(&self) -> Result<()>;
}
