//! The remote authority: holds the canonical history of each playlist and
//! the compare-and-swap token that orders pushes.
//!
//! Request and response bodies are plain serde types so any transport can
//! carry them; objects travel in their canonical encoding inside a [`Bundle`].

mod filesystem;

pub use filesystem::FilesystemAuthority;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::Hash;
use crate::object::{Bundle, PlaylistId, TrackId};

/// Register a new repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub playlist: PlaylistId,
    pub initial_commit: Hash,
    pub bundle: Bundle,
    /// Set for forks; the authority then creates the live playlist from the
    /// initial commit's blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_parent: Option<PlaylistId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    pub playlist: PlaylistId,
    pub proposed: Hash,
    pub last_known_sync: Hash,
    /// Commits reachable from `proposed` but not from `last_known_sync`
    pub bundle: Bundle,
    /// Hash of a drifted live sequence already folded into `proposed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_live: Option<Hash>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PushOutcome {
    /// The sync pointer now names `commit` and the live playlist matches it.
    Success { commit: Hash },
    /// The sync pointer had moved past the client's token. `bundle` holds the
    /// commits the client is missing.
    RemoteUpdates { latest_sync: Hash, bundle: Bundle },
    /// The live playlist no longer matches the last synced commit.
    ExternalUpdates { live: Vec<TrackId> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub playlist: PlaylistId,
    /// Newest commit the client already holds, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known: Option<Hash>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullResponse {
    pub latest_sync: Hash,
    pub bundle: Bundle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_parent: Option<PlaylistId>,
}

#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Fails with `RepositoryExists` if the playlist is already registered.
    async fn create_repository(&self, request: CreateRequest) -> Result<()>;

    async fn push(&self, request: PushRequest) -> Result<PushOutcome>;

    /// Fails with `RepositoryNotFound` for unknown playlists.
    async fn pull(&self, request: PullRequest) -> Result<PullResponse>;

    /// Current live sequence of a playlist on the external service.
    async fn live_sequence(&self, playlist: &PlaylistId) -> Result<Vec<TrackId>>;
}

#[async_trait]
impl<A: RemoteAuthority + ?Sized> RemoteAuthority for Arc<A> {
    async fn create_repository(&self, request: CreateRequest) -> Result<()> {
        (**self).create_repository(request).await
    }

    async fn push(&self, request: PushRequest) -> Result<PushOutcome> {
        (**self).push(request).await
    }

    async fn pull(&self, request: PullRequest) -> Result<PullResponse> {
        (**self).pull(request).await
    }

    async fn live_sequence(&self, playlist: &PlaylistId) -> Result<Vec<TrackId>> {
        (**self).live_sequence(playlist).await
    }
}
