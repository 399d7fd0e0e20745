//! Client side of the synchronization protocol.
//!
//! A [`SyncClient`] owns a local object store (whose state document is the
//! [`CloneTable`]) and talks to one [`RemoteAuthority`]. Network outcomes are
//! returned as sum types; divergence is recorded on the clone as a
//! [`Conflict`] and never merged automatically.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::{AuthorId, Blob, Commit, ObjectStore, PlaylistId, PlaylistMetadata, TrackId};
use crate::remote::{CreateRequest, PullRequest, PushOutcome, PushRequest, RemoteAuthority};
use crate::repository::{CloneTable, Conflict, LocalClone, SharedClone, SyncState};
use crate::sequence::{diff_sequences, visual_diff, VisualEntry};
use crate::storage::{MutableState, StorageBackend};

/// How [`SyncClient::init_or_clone`] obtained the clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initialized {
    /// The playlist was new to the authority and has been registered.
    Created { head: Hash },
    Cloned { head: Hash },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PullOutcome {
    UpToDate,
    /// Local HEAD already contains the remote sync commit.
    Ahead,
    FastForwarded { head: Hash },
    /// A fast-forward is possible but would overwrite uncommitted changes.
    StagingDirty { remote_head: Hash },
    /// Histories have diverged; recorded as a remote conflict.
    Diverged { remote_head: Hash },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub state: SyncState,
    pub head: Hash,
    pub last_sync: Hash,
    pub conflict: Option<Conflict>,
    /// HEAD's blob against the staging sequence
    pub changes: Vec<VisualEntry<TrackId>>,
}

pub struct SyncClient<S, R> {
    author: AuthorId,
    store: ObjectStore<S>,
    remote: R,
    sessions: Mutex<HashMap<PlaylistId, SharedClone>>,
}

impl<S, R> SyncClient<S, R>
where
    S: StorageBackend<CloneTable>,
    R: RemoteAuthority,
{
    pub fn new(author: AuthorId, storage: S, remote: R) -> Result<Self> {
        storage.initialize()?;
        Ok(SyncClient {
            author,
            store: ObjectStore::new(storage),
            remote,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn author(&self) -> &AuthorId {
        &self.author
    }

    pub fn store(&self) -> &ObjectStore<S> {
        &self.store
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    fn session(&self, playlist: &PlaylistId) -> SharedClone {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.entry(playlist.clone()).or_default().clone()
    }

    fn clone_table(&self) -> Result<CloneTable> {
        MutableState::<CloneTable>::read_state(self.store.storage())
    }

    fn update_clone<F, T>(&self, playlist: &PlaylistId, update: F) -> Result<T>
    where
        F: FnOnce(&mut LocalClone) -> Result<T>,
    {
        MutableState::<CloneTable>::update_state(self.store.storage(), |table| {
            update(table.get_mut(playlist)?)
        })
    }

    fn insert_clone(&self, clone: LocalClone) -> Result<()> {
        MutableState::<CloneTable>::update_state(self.store.storage(), |table| {
            if table.clones.contains_key(&clone.playlist) {
                return Err(Error::CloneExists(clone.playlist.clone()));
            }
            table.clones.insert(clone.playlist.clone(), clone);
            Ok(())
        })
    }

    fn ensure_no_clone(&self, playlist: &PlaylistId) -> Result<()> {
        if self.clone_table()?.clones.contains_key(playlist) {
            return Err(Error::CloneExists(playlist.clone()));
        }
        Ok(())
    }

    pub fn clone_of(&self, playlist: &PlaylistId) -> Result<LocalClone> {
        self.clone_table()?.get(playlist).cloned()
    }

    pub fn clones(&self) -> Result<Vec<LocalClone>> {
        Ok(self.clone_table()?.clones.into_values().collect())
    }

    /// Store `tracks` and the metadata texts, then a commit over them.
    fn record_commit(
        &self,
        parents: Vec<Hash>,
        tracks: Vec<TrackId>,
        metadata: &PlaylistMetadata,
        message: impl Into<String>,
    ) -> Result<Hash> {
        let blob = self.store.put_blob(&Blob::new(tracks))?;
        self.store.put_text(&metadata.name)?;
        self.store.put_text(&metadata.description)?;
        let commit = Commit::new(
            self.author.clone(),
            message,
            parents,
            blob,
            metadata,
            Utc::now(),
        );
        let hash = self.store.put_commit(&commit)?;
        tracing::debug!("recorded commit {} ({} parent(s))", hash.short(), commit.parents.len());
        Ok(hash)
    }

    fn metadata_of(&self, commit: &Commit) -> Result<PlaylistMetadata> {
        Ok(PlaylistMetadata::new(
            self.store.text(&commit.name_hash)?,
            self.store.text(&commit.description_hash)?,
        ))
    }

    /// Clone the playlist from the authority, or register it there first if
    /// the authority has never seen it.
    pub async fn init_or_clone(
        &self,
        playlist: &PlaylistId,
        metadata: PlaylistMetadata,
    ) -> Result<Initialized> {
        let session = self.session(playlist);
        let _lock = session.lock().await;
        self.ensure_no_clone(playlist)?;

        let request = PullRequest {
            playlist: playlist.clone(),
            known: None,
        };
        match self.remote.pull(request).await {
            Ok(response) => {
                self.store.put_bundle(&response.bundle)?;
                let head = response.latest_sync;
                let commit = self.store.commit(&head)?;
                let blob = self.store.blob(&commit.blob)?;
                let metadata = self.metadata_of(&commit)?;
                self.insert_clone(LocalClone::at_commit(
                    playlist.clone(),
                    head,
                    blob,
                    metadata,
                    response.fork_parent,
                ))?;
                tracing::info!("Cloned {} at {}", playlist, head.short());
                Ok(Initialized::Cloned { head })
            }
            Err(Error::RepositoryNotFound(_)) => {
                let live = self.remote.live_sequence(playlist).await?;
                let head = self.record_commit(vec![], live.clone(), &metadata, "Initial import")?;
                self.remote
                    .create_repository(CreateRequest {
                        playlist: playlist.clone(),
                        initial_commit: head,
                        bundle: self.store.bundle_between(&head, None)?,
                        fork_parent: None,
                    })
                    .await?;
                self.insert_clone(LocalClone::at_commit(
                    playlist.clone(),
                    head,
                    Blob::new(live),
                    metadata,
                    None,
                ))?;
                tracing::info!("Initialized {} at {}", playlist, head.short());
                Ok(Initialized::Created { head })
            }
            Err(e) => Err(e),
        }
    }

    /// Start a new repository from `source`'s HEAD. The fork's history is
    /// independent; only the `fork_parent` link relates the two.
    pub async fn fork(&self, source: &PlaylistId, target: &PlaylistId, name: String) -> Result<Hash> {
        let session = self.session(target);
        let _lock = session.lock().await;
        self.ensure_no_clone(target)?;

        let source_clone = self.clone_of(source)?;
        let blob = self.store.commit_blob(&source_clone.head)?;
        let metadata = PlaylistMetadata::new(name, source_clone.description.clone());
        let head = self.record_commit(
            vec![],
            blob.tracks().to_vec(),
            &metadata,
            format!("Fork of {}", source),
        )?;

        self.remote
            .create_repository(CreateRequest {
                playlist: target.clone(),
                initial_commit: head,
                bundle: self.store.bundle_between(&head, None)?,
                fork_parent: Some(source.clone()),
            })
            .await?;
        self.insert_clone(LocalClone::at_commit(
            target.clone(),
            head,
            blob,
            metadata,
            Some(source.clone()),
        ))?;
        tracing::info!("Forked {} into {} at {}", source, target, head.short());
        Ok(head)
    }

    /// Forget the local clone. Stored objects are kept.
    pub async fn delete_clone(&self, playlist: &PlaylistId) -> Result<()> {
        let session = self.session(playlist);
        let _lock = session.lock().await;
        MutableState::<CloneTable>::update_state(self.store.storage(), |table| {
            table
                .clones
                .remove(playlist)
                .map(|_| ())
                .ok_or_else(|| Error::CloneNotFound(playlist.clone()))
        })?;
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(playlist);
        Ok(())
    }

    /// Run a staging edit under the clone's lock.
    async fn edit<F, T>(&self, playlist: &PlaylistId, edit: F) -> Result<T>
    where
        F: FnOnce(&mut LocalClone) -> Result<T>,
    {
        let session = self.session(playlist);
        let _lock = session.lock().await;
        self.update_clone(playlist, edit)
    }

    pub async fn insert(&self, playlist: &PlaylistId, at: usize, track: TrackId) -> Result<()> {
        self.edit(playlist, |clone| clone.insert(at, track)).await
    }

    pub async fn remove(&self, playlist: &PlaylistId, at: usize) -> Result<TrackId> {
        self.edit(playlist, |clone| clone.remove(at)).await
    }

    pub async fn move_track(&self, playlist: &PlaylistId, from: usize, to: usize) -> Result<()> {
        self.edit(playlist, |clone| clone.move_track(from, to)).await
    }

    pub async fn replace(&self, playlist: &PlaylistId, tracks: Vec<TrackId>) -> Result<()> {
        self.edit(playlist, |clone| {
            clone.replace(tracks);
            Ok(())
        })
        .await
    }

    /// Stage a new name and/or description.
    pub async fn set_metadata(
        &self,
        playlist: &PlaylistId,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<()> {
        self.edit(playlist, |clone| {
            if let Some(name) = name {
                clone.name = name;
            }
            if let Some(description) = description {
                clone.description = description;
            }
            Ok(())
        })
        .await
    }

    /// Replace staging with the blob of `commit`. HEAD does not move.
    pub async fn checkout(&self, playlist: &PlaylistId, commit: &Hash) -> Result<()> {
        let tracks = self.store.commit_blob(commit)?.into_tracks();
        self.edit(playlist, |clone| {
            clone.replace(tracks);
            Ok(())
        })
        .await
    }

    /// Drop uncommitted changes, including staged metadata.
    pub async fn discard(&self, playlist: &PlaylistId) -> Result<()> {
        let session = self.session(playlist);
        let _lock = session.lock().await;
        let clone = self.clone_of(playlist)?;
        let head = self.store.commit(&clone.head)?;
        let tracks = self.store.blob(&head.blob)?.into_tracks();
        let metadata = self.metadata_of(&head)?;
        self.update_clone(playlist, |clone| {
            clone.replace(tracks);
            clone.name = metadata.name;
            clone.description = metadata.description;
            Ok(())
        })
    }

    pub fn status(&self, playlist: &PlaylistId) -> Result<Status> {
        let clone = self.clone_of(playlist)?;
        let head = self.store.commit(&clone.head)?;
        let head_blob = self.store.blob(&head.blob)?;

        let state = if self.session(playlist).is_pushing() {
            SyncState::Pushing
        } else {
            clone.state(&head)
        };
        let changes = visual_diff(&diff_sequences(head_blob.tracks(), &clone.staging))?;

        Ok(Status {
            state,
            head: clone.head,
            last_sync: clone.last_sync,
            conflict: clone.conflict,
            changes,
        })
    }

    pub fn log(&self, playlist: &PlaylistId, limit: Option<usize>) -> Result<Vec<(Hash, Commit)>> {
        let clone = self.clone_of(playlist)?;
        self.store.history(&clone.head, limit)
    }

    /// Visual diff between the blobs of two commits.
    pub fn diff(&self, from: &Hash, to: &Hash) -> Result<Vec<VisualEntry<TrackId>>> {
        let old = self.store.commit_blob(from)?;
        let new = self.store.commit_blob(to)?;
        Ok(visual_diff(&diff_sequences(old.tracks(), new.tracks()))?)
    }

    /// The other side of the outstanding conflict: the remote head's
    /// sequence or the drifted live sequence.
    pub fn conflict_sequence(&self, playlist: &PlaylistId) -> Result<Vec<TrackId>> {
        let clone = self.clone_of(playlist)?;
        match clone.conflict {
            Some(Conflict::Remote { remote_head }) => {
                Ok(self.store.commit_blob(&remote_head)?.into_tracks())
            }
            Some(Conflict::External { live }) => Ok(live),
            None => Err(Error::NoConflict(playlist.clone())),
        }
    }

    /// Visual diff from HEAD's blob to the other side of the conflict.
    /// Uncommitted staging edits are not part of it.
    pub fn conflict_diff(&self, playlist: &PlaylistId) -> Result<Vec<VisualEntry<TrackId>>> {
        let theirs = self.conflict_sequence(playlist)?;
        let clone = self.clone_of(playlist)?;
        let ours = self.store.commit_blob(&clone.head)?;
        Ok(visual_diff(&diff_sequences(ours.tracks(), &theirs))?)
    }

    /// Commit the staging sequence on top of HEAD.
    pub async fn commit(&self, playlist: &PlaylistId, message: &str) -> Result<Hash> {
        let session = self.session(playlist);
        let _lock = session.lock().await;
        let clone = self.clone_of(playlist)?;
        clone.ensure_unconflicted()?;

        let head = self.record_commit(
            vec![clone.head],
            clone.staging.clone(),
            &clone.metadata(),
            message,
        )?;
        self.update_clone(playlist, |clone| {
            clone.head = head;
            Ok(())
        })?;
        tracing::info!("Committed {} on {}", head.short(), playlist);
        Ok(head)
    }

    /// Offer HEAD to the authority.
    ///
    /// Nothing local changes until the authority answers, so dropping the
    /// returned future leaves the clone as it was.
    pub async fn push(&self, playlist: &PlaylistId) -> Result<PushOutcome> {
        let session = self.session(playlist);
        let _lock = session.lock().await;
        let clone = self.clone_of(playlist)?;
        clone.ensure_unconflicted()?;

        let request = PushRequest {
            playlist: playlist.clone(),
            proposed: clone.head,
            last_known_sync: clone.last_sync,
            bundle: self.store.bundle_between(&clone.head, Some(&clone.last_sync))?,
            acknowledged_live: clone.acknowledged_live,
        };
        tracing::info!(
            "Pushing {} to {} ({} commit(s))",
            clone.head.short(),
            playlist,
            request.bundle.commits.len()
        );

        let outcome = {
            let _pushing = session.begin_push();
            self.remote.push(request).await?
        };

        match &outcome {
            PushOutcome::Success { commit } => {
                self.update_clone(playlist, |clone| {
                    clone.last_sync = *commit;
                    clone.acknowledged_live = None;
                    Ok(())
                })?;
            }
            PushOutcome::RemoteUpdates {
                latest_sync,
                bundle,
            } => {
                self.store.put_bundle(bundle)?;
                if self.store.is_ancestor(&clone.head, latest_sync)? {
                    tracing::info!("Remote {} is ahead; pull to fast-forward", latest_sync.short());
                } else {
                    tracing::warn!("History of {} diverged from remote {}", playlist, latest_sync.short());
                    self.update_clone(playlist, |clone| {
                        clone.conflict = Some(Conflict::Remote {
                            remote_head: *latest_sync,
                        });
                        Ok(())
                    })?;
                }
            }
            PushOutcome::ExternalUpdates { live } => {
                tracing::warn!("Live playlist {} was edited outside version control", playlist);
                self.update_clone(playlist, |clone| {
                    clone.conflict = Some(Conflict::External { live: live.clone() });
                    Ok(())
                })?;
            }
        }
        Ok(outcome)
    }

    /// Fetch the authority's history and fast-forward when that is safe.
    pub async fn pull(&self, playlist: &PlaylistId) -> Result<PullOutcome> {
        let session = self.session(playlist);
        let _lock = session.lock().await;
        let clone = self.clone_of(playlist)?;

        let response = self
            .remote
            .pull(PullRequest {
                playlist: playlist.clone(),
                known: Some(clone.last_sync),
            })
            .await?;
        self.store.put_bundle(&response.bundle)?;
        let remote_head = response.latest_sync;

        if self.store.is_ancestor(&remote_head, &clone.head)? {
            self.update_clone(playlist, |clone| {
                clone.last_sync = remote_head;
                Ok(())
            })?;
            return Ok(if remote_head == clone.head {
                PullOutcome::UpToDate
            } else {
                PullOutcome::Ahead
            });
        }

        // Fast-forwarding or recording a divergence would replace the drift
        // the user still has to fold in
        if let Some(Conflict::External { .. }) = clone.conflict {
            tracing::warn!(
                "Not updating {} from remote {}: live drift is unresolved",
                playlist,
                remote_head.short()
            );
            return Err(Error::Conflicted(playlist.clone()));
        }

        if self.store.is_ancestor(&clone.head, &remote_head)? {
            let head = self.store.commit(&clone.head)?;
            if clone.state(&head) != SyncState::Clean {
                tracing::warn!("Not fast-forwarding {}: uncommitted changes", playlist);
                return Ok(PullOutcome::StagingDirty { remote_head });
            }

            let commit = self.store.commit(&remote_head)?;
            let tracks = self.store.blob(&commit.blob)?.into_tracks();
            let metadata = self.metadata_of(&commit)?;
            self.update_clone(playlist, |clone| {
                clone.head = remote_head;
                clone.last_sync = remote_head;
                clone.replace(tracks);
                clone.name = metadata.name;
                clone.description = metadata.description;
                clone.acknowledged_live = None;
                Ok(())
            })?;
            tracing::info!("Fast-forwarded {} to {}", playlist, remote_head.short());
            return Ok(PullOutcome::FastForwarded { head: remote_head });
        }

        tracing::warn!("History of {} diverged from remote {}", playlist, remote_head.short());
        self.update_clone(playlist, |clone| {
            clone.conflict = Some(Conflict::Remote { remote_head });
            Ok(())
        })?;
        Ok(PullOutcome::Diverged { remote_head })
    }

    /// Settle a remote conflict with a merge commit whose blob is `tracks`.
    pub async fn resolve_remote(
        &self,
        playlist: &PlaylistId,
        tracks: Vec<TrackId>,
        message: &str,
    ) -> Result<Hash> {
        let session = self.session(playlist);
        let _lock = session.lock().await;
        let clone = self.clone_of(playlist)?;
        let remote_head = match clone.conflict {
            Some(Conflict::Remote { remote_head }) => remote_head,
            _ => return Err(Error::NoConflict(playlist.clone())),
        };

        let merge = self.record_commit(
            vec![clone.head, remote_head],
            tracks.clone(),
            &clone.metadata(),
            message,
        )?;
        self.update_clone(playlist, |clone| {
            clone.head = merge;
            clone.last_sync = remote_head;
            clone.replace(tracks);
            clone.conflict = None;
            Ok(())
        })?;
        tracing::info!("Merged {} into {} as {}", remote_head.short(), playlist, merge.short());
        Ok(merge)
    }

    /// Settle an external-drift conflict by committing `tracks` and
    /// acknowledging the drifted live sequence for the next push.
    pub async fn resolve_external(
        &self,
        playlist: &PlaylistId,
        tracks: Vec<TrackId>,
        message: &str,
    ) -> Result<Hash> {
        let session = self.session(playlist);
        let _lock = session.lock().await;
        let clone = self.clone_of(playlist)?;
        let live = match clone.conflict {
            Some(Conflict::External { ref live }) => live.clone(),
            _ => return Err(Error::NoConflict(playlist.clone())),
        };

        let head = self.record_commit(vec![clone.head], tracks.clone(), &clone.metadata(), message)?;
        self.update_clone(playlist, |clone| {
            clone.head = head;
            clone.replace(tracks);
            clone.acknowledged_live = Some(Blob::new(live).hash());
            clone.conflict = None;
            Ok(())
        })?;
        tracing::info!("Folded live changes into {} as {}", playlist, head.short());
        Ok(head)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::live::{LiveService, MemoryLiveService};
    use crate::remote::{FilesystemAuthority, PullResponse};
    use crate::sequence::ChangeState;
    use crate::storage::FilesystemStorage;

    fn tracks(ids: &str) -> Vec<TrackId> {
        ids.chars().map(|c| TrackId::new(c.to_string())).collect()
    }

    type Client<R> = SyncClient<FilesystemStorage, R>;

    struct Fixture {
        _dir: TempDir,
        client: Client<FilesystemAuthority<MemoryLiveService>>,
        playlist: PlaylistId,
    }

    async fn fixture(initial: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let live = MemoryLiveService::new();
        let playlist = PlaylistId::from("p1");
        live.set(&playlist, tracks(initial)).await;
        let authority = FilesystemAuthority::open(dir.path().join("remote"), live).unwrap();
        let storage = FilesystemStorage::new(dir.path().join("local")).unwrap();
        let client = SyncClient::new(AuthorId::from("alice"), storage, authority).unwrap();
        Fixture {
            _dir: dir,
            client,
            playlist,
        }
    }

    #[tokio::test]
    async fn test_init_registers_then_refuses_second_clone() {
        let f = fixture("abc").await;
        let init = f
            .client
            .init_or_clone(&f.playlist, PlaylistMetadata::new("Mix", "daily"))
            .await
            .unwrap();
        let head = match init {
            Initialized::Created { head } => head,
            other => panic!("expected a new repository, got {:?}", other),
        };

        let clone = f.client.clone_of(&f.playlist).unwrap();
        assert_eq!(clone.head, head);
        assert_eq!(clone.last_sync, head);
        assert_eq!(clone.staging, tracks("abc"));
        assert_eq!(f.client.remote().repository(&f.playlist).unwrap().latest_sync, head);

        let again = f
            .client
            .init_or_clone(&f.playlist, PlaylistMetadata::default())
            .await;
        assert!(matches!(again, Err(Error::CloneExists(_))));
    }

    #[tokio::test]
    async fn test_edit_status_commit_log() {
        let f = fixture("abc").await;
        f.client
            .init_or_clone(&f.playlist, PlaylistMetadata::new("Mix", ""))
            .await
            .unwrap();
        assert_eq!(f.client.status(&f.playlist).unwrap().state, SyncState::Clean);

        f.client
            .insert(&f.playlist, 1, TrackId::from("x"))
            .await
            .unwrap();
        f.client.move_track(&f.playlist, 3, 0).await.unwrap();

        let status = f.client.status(&f.playlist).unwrap();
        assert_eq!(status.state, SyncState::Dirty);
        let inserted: Vec<&TrackId> = status
            .changes
            .iter()
            .filter(|e| matches!(e.state, ChangeState::Inserted { moved_from: None }))
            .map(|e| &e.value)
            .collect();
        assert_eq!(inserted, vec![&TrackId::from("x")]);
        assert!(status.changes.iter().any(|e| e.is_move()));

        let head = f.client.commit(&f.playlist, "shuffle").await.unwrap();
        let status = f.client.status(&f.playlist).unwrap();
        assert_eq!(status.state, SyncState::Clean);
        assert_eq!(status.head, head);

        let log = f.client.log(&f.playlist, None).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].0, head);
        assert_eq!(log[0].1.message, "shuffle");
    }

    #[tokio::test]
    async fn test_checkout_and_discard() {
        let f = fixture("abc").await;
        let root = match f
            .client
            .init_or_clone(&f.playlist, PlaylistMetadata::new("Mix", ""))
            .await
            .unwrap()
        {
            Initialized::Created { head } => head,
            Initialized::Cloned { head } => head,
        };
        f.client.remove(&f.playlist, 0).await.unwrap();
        let second = f.client.commit(&f.playlist, "drop a").await.unwrap();

        f.client.checkout(&f.playlist, &root).await.unwrap();
        let clone = f.client.clone_of(&f.playlist).unwrap();
        assert_eq!(clone.head, second);
        assert_eq!(clone.staging, tracks("abc"));

        f.client
            .set_metadata(&f.playlist, Some("Renamed".to_string()), None)
            .await
            .unwrap();
        f.client.discard(&f.playlist).await.unwrap();
        let clone = f.client.clone_of(&f.playlist).unwrap();
        assert_eq!(clone.staging, tracks("bc"));
        assert_eq!(clone.name, "Mix");

        let entries = f.client.diff(&root, &second).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_removed());
    }

    #[tokio::test]
    async fn test_fork_and_delete() {
        let f = fixture("abc").await;
        f.client
            .init_or_clone(&f.playlist, PlaylistMetadata::new("Mix", "daily"))
            .await
            .unwrap();

        let fork = PlaylistId::from("p2");
        let head = f
            .client
            .fork(&f.playlist, &fork, "Mix (copy)".to_string())
            .await
            .unwrap();

        let clone = f.client.clone_of(&fork).unwrap();
        assert_eq!(clone.fork_parent, Some(f.playlist.clone()));
        assert_eq!(clone.description, "daily");
        assert!(f.client.store().commit(&head).unwrap().is_root());
        assert_eq!(
            f.client.remote().live().current_sequence(&fork).await.unwrap(),
            tracks("abc")
        );

        f.client.delete_clone(&fork).await.unwrap();
        assert!(matches!(f.client.clone_of(&fork), Err(Error::CloneNotFound(_))));
        assert!(matches!(
            f.client.delete_clone(&fork).await,
            Err(Error::CloneNotFound(_))
        ));
        assert!(f.client.store().has(&head).unwrap());
    }

    #[tokio::test]
    async fn test_external_drift_round_trip() {
        let f = fixture("abc").await;
        f.client
            .init_or_clone(&f.playlist, PlaylistMetadata::new("Mix", ""))
            .await
            .unwrap();
        f.client
            .remote()
            .live()
            .set(&f.playlist, tracks("abcq"))
            .await;

        f.client.move_track(&f.playlist, 2, 0).await.unwrap();
        f.client.commit(&f.playlist, "c first").await.unwrap();
        let outcome = f.client.push(&f.playlist).await.unwrap();
        assert!(matches!(outcome, PushOutcome::ExternalUpdates { .. }));
        assert_eq!(f.client.status(&f.playlist).unwrap().state, SyncState::Conflicted);
        assert!(matches!(
            f.client.commit(&f.playlist, "blocked").await,
            Err(Error::Conflicted(_))
        ));
        assert!(matches!(
            f.client.resolve_remote(&f.playlist, tracks("cab"), "wrong kind").await,
            Err(Error::NoConflict(_))
        ));
        assert_eq!(f.client.conflict_sequence(&f.playlist).unwrap(), tracks("abcq"));

        f.client
            .resolve_external(&f.playlist, tracks("cabq"), "keep q")
            .await
            .unwrap();
        let outcome = f.client.push(&f.playlist).await.unwrap();
        assert!(matches!(outcome, PushOutcome::Success { .. }));
        assert_eq!(
            f.client.remote().live().current_sequence(&f.playlist).await.unwrap(),
            tracks("cabq")
        );
        let clone = f.client.clone_of(&f.playlist).unwrap();
        assert_eq!(clone.acknowledged_live, None);
        assert_eq!(clone.last_sync, clone.head);
    }

    #[tokio::test]
    async fn test_drift_review_ignores_uncommitted_edits() {
        let f = fixture("abc").await;
        f.client
            .init_or_clone(&f.playlist, PlaylistMetadata::new("Mix", ""))
            .await
            .unwrap();
        f.client
            .remote()
            .live()
            .set(&f.playlist, tracks("abcq"))
            .await;
        f.client
            .insert(&f.playlist, 0, TrackId::from("z"))
            .await
            .unwrap();

        let outcome = f.client.push(&f.playlist).await.unwrap();
        assert!(matches!(outcome, PushOutcome::ExternalUpdates { .. }));

        let entries = f.client.conflict_diff(&f.playlist).unwrap();
        let rows: Vec<(String, ChangeState)> = entries
            .iter()
            .map(|e| (e.value.to_string(), e.state))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("a".to_string(), ChangeState::Unchanged),
                ("b".to_string(), ChangeState::Unchanged),
                ("c".to_string(), ChangeState::Unchanged),
                ("q".to_string(), ChangeState::Inserted { moved_from: None }),
            ]
        );
        // Staging keeps the uncommitted edit
        assert_eq!(f.client.clone_of(&f.playlist).unwrap().staging, tracks("zabc"));
    }

    /// Authority whose push never answers
    struct StalledPush<A>(A);

    #[async_trait]
    impl<A: RemoteAuthority> RemoteAuthority for StalledPush<A> {
        async fn create_repository(&self, request: CreateRequest) -> Result<()> {
            self.0.create_repository(request).await
        }

        async fn push(&self, _request: PushRequest) -> Result<PushOutcome> {
            std::future::pending().await
        }

        async fn pull(&self, request: PullRequest) -> Result<PullResponse> {
            self.0.pull(request).await
        }

        async fn live_sequence(&self, playlist: &PlaylistId) -> Result<Vec<TrackId>> {
            self.0.live_sequence(playlist).await
        }
    }

    #[tokio::test]
    async fn test_dropped_push_leaves_clone_untouched() {
        let dir = TempDir::new().unwrap();
        let live = MemoryLiveService::new();
        let playlist = PlaylistId::from("p1");
        live.set(&playlist, tracks("abc")).await;
        let authority = FilesystemAuthority::open(dir.path().join("remote"), live).unwrap();
        let storage = FilesystemStorage::new(dir.path().join("local")).unwrap();
        let client =
            SyncClient::new(AuthorId::from("alice"), storage, StalledPush(authority)).unwrap();

        client
            .init_or_clone(&playlist, PlaylistMetadata::new("Mix", ""))
            .await
            .unwrap();
        client.remove(&playlist, 0).await.unwrap();
        client.commit(&playlist, "drop a").await.unwrap();
        let before = client.clone_of(&playlist).unwrap();

        {
            let push = client.push(&playlist);
            tokio::pin!(push);
            tokio::select! {
                biased;
                _ = &mut push => panic!("stalled push completed"),
                _ = async {} => {
                    assert_eq!(client.status(&playlist).unwrap().state, SyncState::Pushing);
                }
            }
        }

        assert_eq!(client.status(&playlist).unwrap().state, SyncState::Clean);
        assert_eq!(client.clone_of(&playlist).unwrap(), before);
    }
}
