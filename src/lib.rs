#![deny(clippy::mod_module_files)]
//! Version history for streaming-service playlists.
//!
//! Playlists are ordered lists of track ids that change in three places at
//! once: a user's local working copy, other collaborators' pushes, and the
//! streaming service itself. This crate keeps a content-addressed commit
//! graph of them, orders pushes with a compare-and-swap token held by a
//! remote authority, and turns sequence diffs into single-element
//! insert/remove/move calls the streaming service can execute.

pub mod config;
pub mod error;
pub mod hash;
pub mod live;
pub mod object;
pub mod remote;
pub mod repository;
pub mod sequence;
pub mod storage;
pub mod sync;

pub use error::{Error, InvariantViolation, Result};
pub use hash::Hash;
pub use object::{AuthorId, Blob, Commit, PlaylistId, PlaylistMetadata, TrackId};
pub use repository::{Conflict, SyncState};
pub use sync::{Initialized, PullOutcome, Status, SyncClient};
