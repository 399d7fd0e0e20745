use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AuthorId;
use crate::hash::{hash_value, Hash};

/// Name and description of a playlist at commit time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistMetadata {
    pub name: String,
    pub description: String,
}

impl PlaylistMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        PlaylistMetadata {
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn name_hash(&self) -> Hash {
        hash_value(&self.name)
    }

    pub fn description_hash(&self) -> Hash {
        hash_value(&self.description)
    }
}

/// An immutable history node: a blob pointer, its parents, and metadata.
///
/// Field order is part of the canonical encoding and therefore of every commit
/// hash ever produced. Do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Commit {
    pub author: AuthorId,
    /// Milliseconds since the Unix epoch in canonical form
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub parents: Vec<Hash>,
    pub blob: Hash,
    pub name_hash: Hash,
    pub description_hash: Hash,
}

impl Commit {
    /// Build a commit. The timestamp is truncated to millisecond precision so
    /// that the in-memory value equals its own decoded canonical form.
    pub fn new(
        author: AuthorId,
        message: impl Into<String>,
        parents: Vec<Hash>,
        blob: Hash,
        metadata: &PlaylistMetadata,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let timestamp =
            DateTime::from_timestamp_millis(timestamp.timestamp_millis()).unwrap_or(timestamp);
        Commit {
            author,
            timestamp,
            message: message.into(),
            parents,
            blob,
            name_hash: metadata.name_hash(),
            description_hash: metadata.description_hash(),
        }
    }

    pub fn hash(&self) -> Hash {
        hash_value(self)
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}
