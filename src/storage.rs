mod filesystem;
mod traits;

pub(crate) use filesystem::write_atomic;
pub use filesystem::{FilesystemStorage, LockFile};
pub use traits::{ImmutableStore, MutableState, StorageBackend};
