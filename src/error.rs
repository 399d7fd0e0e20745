use thiserror::Error;

use crate::hash::Hash;
use crate::object::PlaylistId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A broken internal invariant: replay postcondition failure, an object whose
/// bytes do not hash to its key, and the like.
///
/// Kept as its own type so that pure sequence code can only ever fail this way,
/// and so callers can tell it apart from recoverable conditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invariant violated: {0}")]
pub struct InvariantViolation(pub String);

impl InvariantViolation {
    pub fn new(msg: impl Into<String>) -> Self {
        InvariantViolation(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// A referenced hash is absent from the local store. Recoverable by pulling.
    #[error("object {0} not found")]
    ObjectNotFound(Hash),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    /// The hash names a well-formed object of another kind.
    #[error("{hash} is a {found}, not a {expected}")]
    WrongKind {
        hash: Hash,
        expected: &'static str,
        found: &'static str,
    },

    /// Failure in the network leg. Local clone state is untouched.
    #[error("transport error: {0}")]
    Transport(String),

    /// The id cannot be used as a single path component.
    #[error("invalid playlist id {0:?}")]
    InvalidPlaylistId(PlaylistId),

    #[error("repository {0} not found")]
    RepositoryNotFound(PlaylistId),

    #[error("repository {0} already exists")]
    RepositoryExists(PlaylistId),

    #[error("no local clone of {0}")]
    CloneNotFound(PlaylistId),

    #[error("a local clone of {0} already exists")]
    CloneExists(PlaylistId),

    /// The clone has an unresolved conflict; resolve it before committing or pushing.
    #[error("clone {0} has an unresolved conflict")]
    Conflicted(PlaylistId),

    #[error("no conflict to resolve on {0}")]
    NoConflict(PlaylistId),

    #[error("position {index} out of range for sequence of length {len}")]
    OutOfRange { index: usize, len: usize },

    /// Another process kept the lock file past the wait limit. A stale file
    /// left by a crashed process can be removed by hand.
    #[error("lock {0:?} is held by another process")]
    Locked(std::path::PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn transport(msg: impl std::fmt::Display) -> Self {
        Error::Transport(msg.to_string())
    }

    /// Whether this error is fatal and must not be retried or swallowed.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Error::Invariant(_))
    }
}
