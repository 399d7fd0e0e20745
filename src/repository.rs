//! Mutable records around the immutable object graph: the authority's view
//! of each playlist repository and a user's local working copies.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::{Blob, Commit, PlaylistId, PlaylistMetadata, TrackId};

/// Authority-side record for one playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Repository {
    pub playlist: PlaylistId,
    pub initial_commit: Hash,
    pub heads: BTreeSet<Hash>,
    /// Compare-and-swap token; only a successful push moves it.
    pub latest_sync: Hash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_parent: Option<PlaylistId>,
}

impl Repository {
    pub fn new(playlist: PlaylistId, initial_commit: Hash, fork_parent: Option<PlaylistId>) -> Self {
        Repository {
            playlist,
            initial_commit,
            heads: BTreeSet::from([initial_commit]),
            latest_sync: initial_commit,
            fork_parent,
        }
    }

    /// Record an accepted push of `commit`.
    pub fn advance(&mut self, commit: Hash, parents: &[Hash]) {
        for parent in parents {
            self.heads.remove(parent);
        }
        self.heads.insert(commit);
        self.latest_sync = commit;
    }
}

/// State document of an authority store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryTable {
    #[serde(default)]
    pub repositories: BTreeMap<PlaylistId, Repository>,
}

/// Unresolved divergence found by a push or pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conflict {
    /// Another writer advanced the repository to `remote_head`.
    Remote { remote_head: Hash },
    /// The live playlist was edited outside version control.
    External { live: Vec<TrackId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Clean,
    Dirty,
    Pushing,
    Conflicted,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncState::Clean => "clean",
            SyncState::Dirty => "dirty",
            SyncState::Pushing => "pushing",
            SyncState::Conflicted => "conflicted",
        };
        f.write_str(s)
    }
}

/// A local working copy of a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalClone {
    pub playlist: PlaylistId,
    pub head: Hash,
    /// Last commit known to be the authority's sync commit
    pub last_sync: Hash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_parent: Option<PlaylistId>,
    pub staging: Vec<TrackId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<Conflict>,
    /// Hash of a drifted live sequence the user has already folded into a commit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_live: Option<Hash>,
}

impl LocalClone {
    /// Working copy positioned at `head`, with staging equal to its blob.
    pub fn at_commit(
        playlist: PlaylistId,
        head: Hash,
        blob: Blob,
        metadata: PlaylistMetadata,
        fork_parent: Option<PlaylistId>,
    ) -> Self {
        LocalClone {
            playlist,
            head,
            last_sync: head,
            fork_parent,
            staging: blob.into_tracks(),
            name: metadata.name,
            description: metadata.description,
            conflict: None,
            acknowledged_live: None,
        }
    }

    pub fn metadata(&self) -> PlaylistMetadata {
        PlaylistMetadata::new(self.name.clone(), self.description.clone())
    }

    pub fn staging_blob(&self) -> Blob {
        Blob::new(self.staging.clone())
    }

    pub fn is_conflicted(&self) -> bool {
        self.conflict.is_some()
    }

    /// Fail with `Conflicted` while a conflict is outstanding.
    pub fn ensure_unconflicted(&self) -> Result<()> {
        if self.is_conflicted() {
            return Err(Error::Conflicted(self.playlist.clone()));
        }
        Ok(())
    }

    /// Clean/Dirty/Conflicted relative to the HEAD commit. Pushing is tracked
    /// by [`SharedClone`], not persisted.
    pub fn state(&self, head: &Commit) -> SyncState {
        if self.is_conflicted() {
            return SyncState::Conflicted;
        }
        let metadata = self.metadata();
        if self.staging_blob().hash() != head.blob
            || metadata.name_hash() != head.name_hash
            || metadata.description_hash() != head.description_hash
        {
            SyncState::Dirty
        } else {
            SyncState::Clean
        }
    }

    pub fn insert(&mut self, at: usize, track: TrackId) -> Result<()> {
        if at > self.staging.len() {
            return Err(Error::OutOfRange {
                index: at,
                len: self.staging.len(),
            });
        }
        self.staging.insert(at, track);
        Ok(())
    }

    pub fn remove(&mut self, at: usize) -> Result<TrackId> {
        if at >= self.staging.len() {
            return Err(Error::OutOfRange {
                index: at,
                len: self.staging.len(),
            });
        }
        Ok(self.staging.remove(at))
    }

    /// Move the track at `from` so that it ends up at `to`.
    pub fn move_track(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.staging.len();
        if from >= len || to >= len {
            return Err(Error::OutOfRange {
                index: from.max(to),
                len,
            });
        }
        let track = self.staging.remove(from);
        self.staging.insert(to, track);
        Ok(())
    }

    pub fn replace(&mut self, tracks: Vec<TrackId>) {
        self.staging = tracks;
    }
}

/// State document of a local store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloneTable {
    #[serde(default)]
    pub clones: BTreeMap<PlaylistId, LocalClone>,
}

impl CloneTable {
    pub fn get(&self, playlist: &PlaylistId) -> Result<&LocalClone> {
        self.clones
            .get(playlist)
            .ok_or_else(|| Error::CloneNotFound(playlist.clone()))
    }

    pub fn get_mut(&mut self, playlist: &PlaylistId) -> Result<&mut LocalClone> {
        self.clones
            .get_mut(playlist)
            .ok_or_else(|| Error::CloneNotFound(playlist.clone()))
    }
}

/// Per-clone serialization point.
///
/// Every mutation of a clone holds the lock. A push keeps holding it while
/// awaiting the authority, so edits queue behind it, and raises the pushing
/// flag for readers that must not wait.
#[derive(Clone, Default)]
pub struct SharedClone {
    lock: Arc<Mutex<()>>,
    pushing: Arc<AtomicBool>,
}

impl SharedClone {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> OwnedMutexGuard<()> {
        self.lock.clone().lock_owned().await
    }

    pub fn is_pushing(&self) -> bool {
        self.pushing.load(Ordering::SeqCst)
    }

    /// Raise the pushing flag until the returned guard is dropped.
    pub fn begin_push(&self) -> PushingGuard {
        self.pushing.store(true, Ordering::SeqCst);
        PushingGuard {
            flag: self.pushing.clone(),
        }
    }
}

pub struct PushingGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for PushingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
