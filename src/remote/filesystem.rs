use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use super::{CreateRequest, PullRequest, PullResponse, PushOutcome, PushRequest, RemoteAuthority};
use crate::error::{Error, InvariantViolation, Result};
use crate::hash::Hash;
use crate::live::{execute_ops, LiveService};
use crate::object::{Blob, ObjectStore, PlaylistId, TrackId};
use crate::repository::{Repository, RepositoryTable};
use crate::sequence::{checked_replay_ops, diff_sequences};
use crate::storage::{FilesystemStorage, LockFile, MutableState, StorageBackend};

const LOCK_FILE: &str = "authority.lock";
const LOCK_POLL: Duration = Duration::from_millis(20);
const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Authority backed by a filesystem object store and a live service.
///
/// Pushes and repository creation hold an in-process async lock and a lock
/// file under the store directory for their whole run, so the compare-and-swap
/// on `latest_sync` and the live replay it guards are atomic across every
/// handle and process sharing the directory.
pub struct FilesystemAuthority<L> {
    store: ObjectStore<FilesystemStorage>,
    live: L,
    write_lock: Mutex<()>,
}

impl<L: LiveService> FilesystemAuthority<L> {
    pub fn open<P: AsRef<Path>>(path: P, live: L) -> Result<Self> {
        let storage = FilesystemStorage::new(path)?;
        StorageBackend::<RepositoryTable>::initialize(&storage)?;
        Ok(FilesystemAuthority {
            store: ObjectStore::new(storage),
            live,
            write_lock: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &ObjectStore<FilesystemStorage> {
        &self.store
    }

    pub fn live(&self) -> &L {
        &self.live
    }

    pub fn repository(&self, playlist: &PlaylistId) -> Result<Repository> {
        let table = MutableState::<RepositoryTable>::read_state(self.store.storage())?;
        table
            .repositories
            .get(playlist)
            .cloned()
            .ok_or_else(|| Error::RepositoryNotFound(playlist.clone()))
    }

    /// Wait for the directory-wide lock file.
    async fn lock_directory(&self) -> Result<LockFile> {
        let path = self.store.storage().base_path().join(LOCK_FILE);
        let deadline = Instant::now() + LOCK_TIMEOUT;
        loop {
            if let Some(lock) = LockFile::try_acquire(&path)? {
                return Ok(lock);
            }
            if Instant::now() >= deadline {
                return Err(Error::Locked(path));
            }
            tracing::debug!("waiting for {:?}", path);
            sleep(LOCK_POLL).await;
        }
    }

    fn remote_updates(&self, request: &PushRequest, latest_sync: Hash) -> Result<PushOutcome> {
        tracing::warn!(
            "Push to {} rejected: client token {} is behind {}",
            request.playlist,
            request.last_known_sync.short(),
            latest_sync.short()
        );
        let bundle = self
            .store
            .bundle_between(&latest_sync, Some(&request.last_known_sync))?;
        Ok(PushOutcome::RemoteUpdates {
            latest_sync,
            bundle,
        })
    }

    fn update_repositories<F, R>(&self, update: F) -> Result<R>
    where
        F: FnOnce(&mut RepositoryTable) -> Result<R>,
    {
        MutableState::<RepositoryTable>::update_state(self.store.storage(), update)
    }
}

#[async_trait]
impl<L: LiveService> RemoteAuthority for FilesystemAuthority<L> {
    async fn create_repository(&self, request: CreateRequest) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let _lock = self.lock_directory().await?;
        if self.repository(&request.playlist).is_ok() {
            return Err(Error::RepositoryExists(request.playlist));
        }

        self.store.put_bundle(&request.bundle)?;
        let initial = self.store.commit(&request.initial_commit)?;

        if request.fork_parent.is_some() {
            let blob = self.store.blob(&initial.blob)?;
            self.live
                .create_playlist(&request.playlist, blob.tracks())
                .await?;
        }

        let repository = Repository::new(
            request.playlist.clone(),
            request.initial_commit,
            request.fork_parent.clone(),
        );
        self.update_repositories(|table| {
            if table.repositories.contains_key(&request.playlist) {
                return Err(Error::RepositoryExists(request.playlist.clone()));
            }
            table
                .repositories
                .insert(request.playlist.clone(), repository);
            Ok(())
        })?;

        tracing::info!(
            "Registered repository {} at {}",
            request.playlist,
            request.initial_commit.short()
        );
        Ok(())
    }

    async fn push(&self, request: PushRequest) -> Result<PushOutcome> {
        let _guard = self.write_lock.lock().await;
        let _lock = self.lock_directory().await?;
        let repository = self.repository(&request.playlist)?;

        self.store.put_bundle(&request.bundle)?;
        if !self.store.has(&request.proposed)? {
            return Err(Error::ObjectNotFound(request.proposed));
        }

        if request.last_known_sync != repository.latest_sync {
            return self.remote_updates(&request, repository.latest_sync);
        }

        if !self
            .store
            .is_ancestor(&repository.latest_sync, &request.proposed)?
        {
            return Err(InvariantViolation::new(format!(
                "proposed commit {} does not descend from sync commit {}",
                request.proposed, repository.latest_sync
            ))
            .into());
        }

        let synced = self.store.commit_blob(&repository.latest_sync)?;
        let live = self.live.current_sequence(&request.playlist).await?;
        let live_hash = Blob::new(live.clone()).hash();
        if live_hash != synced.hash() && request.acknowledged_live != Some(live_hash) {
            tracing::warn!(
                "Live playlist {} drifted from sync commit {}",
                request.playlist,
                repository.latest_sync.short()
            );
            return Ok(PushOutcome::ExternalUpdates { live });
        }

        let proposed = self.store.commit(&request.proposed)?;
        let target = self.store.blob(&proposed.blob)?;
        let script = diff_sequences(&live, target.tracks());
        let ops = checked_replay_ops(&script)?;
        execute_ops(&self.live, &request.playlist, &ops).await?;

        let moved = self.update_repositories(|table| {
            let repository = table
                .repositories
                .get_mut(&request.playlist)
                .ok_or_else(|| Error::RepositoryNotFound(request.playlist.clone()))?;
            if repository.latest_sync != request.last_known_sync {
                return Ok(Some(repository.latest_sync));
            }
            repository.advance(request.proposed, &proposed.parents);
            Ok(None)
        })?;
        if let Some(latest_sync) = moved {
            return self.remote_updates(&request, latest_sync);
        }

        tracing::info!(
            "Accepted push of {} to {} ({} live op(s))",
            request.proposed.short(),
            request.playlist,
            ops.len()
        );
        Ok(PushOutcome::Success {
            commit: request.proposed,
        })
    }

    async fn pull(&self, request: PullRequest) -> Result<PullResponse> {
        let repository = self.repository(&request.playlist)?;
        let bundle = self
            .store
            .bundle_between(&repository.latest_sync, request.known.as_ref())?;
        tracing::debug!(
            "Pull of {}: {} commit(s) since {:?}",
            request.playlist,
            bundle.commits.len(),
            request.known
        );
        Ok(PullResponse {
            latest_sync: repository.latest_sync,
            bundle,
            fork_parent: repository.fork_parent,
        })
    }

    async fn live_sequence(&self, playlist: &PlaylistId) -> Result<Vec<TrackId>> {
        self.live.current_sequence(playlist).await
    }
}
