use serde::{Deserialize, Serialize};

use super::TrackId;
use crate::hash::{hash_value, Hash};

/// An ordered sequence of track ids, identified by its content hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Blob {
    tracks: Vec<TrackId>,
}

impl Blob {
    pub fn new(tracks: Vec<TrackId>) -> Self {
        Blob { tracks }
    }

    pub fn hash(&self) -> Hash {
        hash_value(self)
    }

    pub fn tracks(&self) -> &[TrackId] {
        &self.tracks
    }

    pub fn into_tracks(self) -> Vec<TrackId> {
        self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl From<Vec<TrackId>> for Blob {
    fn from(tracks: Vec<TrackId>) -> Self {
        Blob::new(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(ids: &[&str]) -> Blob {
        Blob::new(ids.iter().map(|id| TrackId::from(*id)).collect())
    }

    #[test]
    fn test_equal_sequences_share_a_hash() {
        assert_eq!(blob(&["a", "b", "a"]).hash(), blob(&["a", "b", "a"]).hash());
    }

    #[test]
    fn test_order_changes_hash() {
        assert_ne!(blob(&["a", "b"]).hash(), blob(&["b", "a"]).hash());
        assert_ne!(blob(&[]).hash(), blob(&["a"]).hash());
    }

    #[test]
    fn test_canonical_form() {
        let json = serde_json::to_string(&blob(&["spotify:track:1"])).unwrap();
        assert_eq!(json, r#"{"tracks":["spotify:track:1"]}"#);
    }
}
