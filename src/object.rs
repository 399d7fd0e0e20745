//! Immutable, content-addressed objects: blobs of track ids, commits, and
//! metadata texts, plus the typed store that reads and writes them.

mod blob;
mod commit;
mod ids;
mod store;

pub use blob::Blob;
pub use commit::{Commit, PlaylistMetadata};
pub use ids::{AuthorId, PlaylistId, TrackId};
pub use store::ObjectStore;

use serde::{Deserialize, Serialize};

use crate::hash::{hash_value, Hash};

/// Any object that can be resolved from a hash.
///
/// Stored bytes carry no type tag; the three shapes are structurally distinct
/// (commits and blobs reject unknown fields, texts are bare strings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Object {
    Commit(Commit),
    Blob(Blob),
    Text(String),
}

impl Object {
    pub fn hash(&self) -> Hash {
        match self {
            Object::Commit(commit) => commit.hash(),
            Object::Blob(blob) => blob.hash(),
            Object::Text(text) => hash_value(text),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Object::Commit(_) => "commit",
            Object::Blob(_) => "blob",
            Object::Text(_) => "text",
        }
    }
}

/// A set of objects moved between a clone and the remote authority.
/// Commits are listed parents-first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bundle {
    #[serde(default)]
    pub commits: Vec<Commit>,
    #[serde(default)]
    pub blobs: Vec<Blob>,
    #[serde(default)]
    pub texts: Vec<String>,
}

impl Bundle {
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty() && self.blobs.is_empty() && self.texts.is_empty()
    }

    pub fn contains_commit(&self, hash: &Hash) -> bool {
        self.commits.iter().any(|c| &c.hash() == hash)
    }
}
