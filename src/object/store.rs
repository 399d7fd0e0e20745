use std::collections::{HashSet, VecDeque};

use serde::de::DeserializeOwned;

use super::{Blob, Bundle, Commit, Object};
use crate::error::{Error, InvariantViolation, Result};
use crate::hash::{canonical_bytes, Hash};
use crate::storage::ImmutableStore;

/// Typed view over an [`ImmutableStore`]: an arena of immutable objects keyed
/// by hash, with parent links followed by key.
pub struct ObjectStore<S> {
    storage: S,
}

impl<S: ImmutableStore> ObjectStore<S> {
    pub fn new(storage: S) -> Self {
        ObjectStore { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn put_blob(&self, blob: &Blob) -> Result<Hash> {
        self.storage.write_object(&canonical_bytes(blob))
    }

    pub fn put_commit(&self, commit: &Commit) -> Result<Hash> {
        self.storage.write_object(&canonical_bytes(commit))
    }

    pub fn put_text(&self, text: &str) -> Result<Hash> {
        self.storage.write_object(&canonical_bytes(text))
    }

    pub fn has(&self, hash: &Hash) -> Result<bool> {
        self.storage.object_exists(hash)
    }

    /// Read and verify the bytes stored under `hash`.
    fn read_verified(&self, hash: &Hash) -> Result<Vec<u8>> {
        let bytes = self.storage.read_object(hash)?;
        let actual = Hash::digest(&bytes);
        if actual != *hash {
            return Err(InvariantViolation::new(format!(
                "object stored under {} hashes to {}",
                hash, actual
            ))
            .into());
        }
        Ok(bytes)
    }

    fn read_as<T: DeserializeOwned>(&self, hash: &Hash, kind: &'static str) -> Result<T> {
        let bytes = self.read_verified(hash)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(value),
            // A well-formed object of another kind is a caller mistake, not corruption
            Err(e) => match serde_json::from_slice::<Object>(&bytes) {
                Ok(other) => Err(Error::WrongKind {
                    hash: *hash,
                    expected: kind,
                    found: other.kind(),
                }),
                Err(_) => Err(InvariantViolation::new(format!(
                    "object {} is not a {}: {}",
                    hash, kind, e
                ))
                .into()),
            },
        }
    }

    pub fn resolve(&self, hash: &Hash) -> Result<Object> {
        self.read_as(hash, "known object")
    }

    pub fn commit(&self, hash: &Hash) -> Result<Commit> {
        self.read_as(hash, "commit")
    }

    pub fn blob(&self, hash: &Hash) -> Result<Blob> {
        self.read_as(hash, "blob")
    }

    pub fn text(&self, hash: &Hash) -> Result<String> {
        self.read_as(hash, "text")
    }

    /// Blob referenced by a commit
    pub fn commit_blob(&self, commit: &Hash) -> Result<Blob> {
        let commit = self.commit(commit)?;
        self.blob(&commit.blob)
    }

    /// Store every object of a bundle, then check that each commit's blob and
    /// parents resolve.
    pub fn put_bundle(&self, bundle: &Bundle) -> Result<()> {
        let texts: Vec<Vec<u8>> = bundle.texts.iter().map(|t| canonical_bytes(t)).collect();
        let blobs: Vec<Vec<u8>> = bundle.blobs.iter().map(canonical_bytes).collect();
        let commits: Vec<Vec<u8>> = bundle.commits.iter().map(canonical_bytes).collect();

        for group in [&texts, &blobs, &commits] {
            let refs: Vec<&[u8]> = group.iter().map(Vec::as_slice).collect();
            self.storage.write_objects(&refs)?;
        }

        for commit in &bundle.commits {
            if !self.has(&commit.blob)? {
                return Err(Error::ObjectNotFound(commit.blob));
            }
            for parent in &commit.parents {
                if !self.has(parent)? {
                    return Err(Error::ObjectNotFound(*parent));
                }
            }
        }

        tracing::debug!(
            "stored bundle: {} commits, {} blobs, {} texts",
            bundle.commits.len(),
            bundle.blobs.len(),
            bundle.texts.len()
        );
        Ok(())
    }

    /// Every commit reachable from `head` (inclusive).
    pub fn ancestors(&self, head: &Hash) -> Result<HashSet<Hash>> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([*head]);
        while let Some(hash) = queue.pop_front() {
            if !seen.insert(hash) {
                continue;
            }
            let commit = self.commit(&hash)?;
            queue.extend(commit.parents);
        }
        Ok(seen)
    }

    /// Whether `ancestor` is reachable from `descendant` (a commit is its own ancestor).
    pub fn is_ancestor(&self, ancestor: &Hash, descendant: &Hash) -> Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([*descendant]);
        while let Some(hash) = queue.pop_front() {
            if &hash == ancestor {
                return Ok(true);
            }
            if !seen.insert(hash) {
                continue;
            }
            queue.extend(self.commit(&hash)?.parents);
        }
        Ok(false)
    }

    /// Commits reachable from `from`, newest first (timestamp, then hash).
    pub fn history(&self, from: &Hash, limit: Option<usize>) -> Result<Vec<(Hash, Commit)>> {
        let mut commits = self
            .ancestors(from)?
            .into_iter()
            .map(|hash| self.commit(&hash).map(|commit| (hash, commit)))
            .collect::<Result<Vec<_>>>()?;
        commits.sort_by(|(ha, a), (hb, b)| b.timestamp.cmp(&a.timestamp).then(hb.cmp(ha)));
        if let Some(limit) = limit {
            commits.truncate(limit);
        }
        Ok(commits)
    }

    /// Objects a holder of `known` needs in order to resolve `head`: every
    /// commit reachable from `head` but not from `known`, parents first, with
    /// their blobs and metadata texts.
    ///
    /// A `known` commit this store has never seen is treated as no knowledge.
    pub fn bundle_between(&self, head: &Hash, known: Option<&Hash>) -> Result<Bundle> {
        let known_set = match known {
            Some(known) if self.has(known)? => self.ancestors(known)?,
            _ => HashSet::new(),
        };

        // Iterative post-order walk so parents precede children
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![(*head, false)];
        while let Some((hash, expanded)) = stack.pop() {
            if expanded {
                order.push(hash);
                continue;
            }
            if known_set.contains(&hash) || !visited.insert(hash) {
                continue;
            }
            let commit = self.commit(&hash)?;
            stack.push((hash, true));
            for parent in commit.parents.iter().rev() {
                stack.push((*parent, false));
            }
        }

        let mut bundle = Bundle::default();
        let mut seen_blobs = HashSet::new();
        let mut seen_texts = HashSet::new();
        for hash in order {
            let commit = self.commit(&hash)?;
            if seen_blobs.insert(commit.blob) {
                bundle.blobs.push(self.blob(&commit.blob)?);
            }
            for text in [commit.name_hash, commit.description_hash] {
                if seen_texts.insert(text) {
                    match self.text(&text) {
                        Ok(t) => bundle.texts.push(t),
                        // Metadata texts are optional for resolution
                        Err(Error::ObjectNotFound(_)) => {}
                        Err(e) => return Err(e),
                    }
                }
            }
            bundle.commits.push(commit);
        }
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::*;
    use crate::object::{AuthorId, PlaylistMetadata, TrackId};
    use crate::storage::{FilesystemStorage, StorageBackend};

    fn store(temp: &TempDir) -> ObjectStore<FilesystemStorage> {
        let storage = FilesystemStorage::new(temp.path()).unwrap();
        StorageBackend::<()>::initialize(&storage).unwrap();
        ObjectStore::new(storage)
    }

    fn commit_on(
        store: &ObjectStore<FilesystemStorage>,
        parents: Vec<Hash>,
        tracks: &[&str],
        second: u32,
    ) -> Hash {
        let blob = Blob::new(tracks.iter().map(|t| TrackId::from(*t)).collect());
        let blob_hash = store.put_blob(&blob).unwrap();
        let metadata = PlaylistMetadata::new("Mix", "");
        store.put_text(&metadata.name).unwrap();
        store.put_text(&metadata.description).unwrap();
        let commit = Commit::new(
            AuthorId::from("alice"),
            format!("commit {}", second),
            parents,
            blob_hash,
            &metadata,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, second).unwrap(),
        );
        store.put_commit(&commit).unwrap()
    }

    #[test]
    fn test_put_and_resolve() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let root = commit_on(&store, vec![], &["a", "b"], 0);
        match store.resolve(&root).unwrap() {
            Object::Commit(c) => {
                assert_eq!(c.hash(), root);
                assert_eq!(store.blob(&c.blob).unwrap().len(), 2);
                assert_eq!(store.text(&c.name_hash).unwrap(), "Mix");
            }
            other => panic!("expected commit, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_hash_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let missing = Hash::digest(b"nothing");
        assert!(matches!(
            store.commit(&missing),
            Err(Error::ObjectNotFound(h)) if h == missing
        ));
    }

    #[test]
    fn test_corrupted_object_is_invariant_violation() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let root = commit_on(&store, vec![], &["a"], 0);

        let path = temp.path().join("objects").join(root.to_hex());
        std::fs::write(path, b"{}").unwrap();

        let err = store.commit(&root).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_wrong_kind_is_reported_not_fatal() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let blob_hash = store.put_blob(&Blob::new(vec![TrackId::from("a")])).unwrap();

        let err = store.commit(&blob_hash).unwrap_err();
        assert!(!err.is_invariant_violation());
        assert!(matches!(
            err,
            Error::WrongKind { expected: "commit", found: "blob", .. }
        ));

        let text_hash = store.put_text("Mix").unwrap();
        assert!(matches!(
            store.blob(&text_hash),
            Err(Error::WrongKind { expected: "blob", found: "text", .. })
        ));
    }

    #[test]
    fn test_ancestry_and_history() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let root = commit_on(&store, vec![], &["a"], 0);
        let left = commit_on(&store, vec![root], &["a", "b"], 1);
        let right = commit_on(&store, vec![root], &["a", "c"], 2);
        let merge = commit_on(&store, vec![left, right], &["a", "b", "c"], 3);

        assert!(store.is_ancestor(&root, &merge).unwrap());
        assert!(store.is_ancestor(&left, &merge).unwrap());
        assert!(!store.is_ancestor(&left, &right).unwrap());
        assert!(store.is_ancestor(&merge, &merge).unwrap());

        let history = store.history(&merge, None).unwrap();
        let order: Vec<Hash> = history.iter().map(|(h, _)| *h).collect();
        assert_eq!(order, vec![merge, right, left, root]);

        assert_eq!(store.history(&merge, Some(2)).unwrap().len(), 2);
    }

    #[test]
    fn test_bundle_between_excludes_known_history() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let root = commit_on(&store, vec![], &["a"], 0);
        let second = commit_on(&store, vec![root], &["a", "b"], 1);
        let third = commit_on(&store, vec![second], &["b", "a"], 2);

        let bundle = store.bundle_between(&third, Some(&root)).unwrap();
        let hashes: Vec<Hash> = bundle.commits.iter().map(Commit::hash).collect();
        assert_eq!(hashes, vec![second, third]);
        assert_eq!(bundle.blobs.len(), 2);

        let everything = store.bundle_between(&third, None).unwrap();
        assert_eq!(everything.commits.len(), 3);
        assert_eq!(everything.commits[0].hash(), root);

        assert!(store.bundle_between(&third, Some(&third)).unwrap().is_empty());
    }

    #[test]
    fn test_put_bundle_into_fresh_store() {
        let source_dir = TempDir::new().unwrap();
        let source = store(&source_dir);
        let root = commit_on(&source, vec![], &["a"], 0);
        let head = commit_on(&source, vec![root], &["a", "b"], 1);
        let bundle = source.bundle_between(&head, None).unwrap();

        let target_dir = TempDir::new().unwrap();
        let target = store(&target_dir);
        target.put_bundle(&bundle).unwrap();
        assert!(target.is_ancestor(&root, &head).unwrap());
        assert_eq!(target.commit_blob(&head).unwrap().len(), 2);
    }

    #[test]
    fn test_put_bundle_with_dangling_parent_fails() {
        let source_dir = TempDir::new().unwrap();
        let source = store(&source_dir);
        let root = commit_on(&source, vec![], &["a"], 0);
        let head = commit_on(&source, vec![root], &["a", "b"], 1);
        let partial = source.bundle_between(&head, Some(&root)).unwrap();

        let target_dir = TempDir::new().unwrap();
        let target = store(&target_dir);
        assert!(matches!(
            target.put_bundle(&partial),
            Err(Error::ObjectNotFound(h)) if h == root
        ));
    }
}
