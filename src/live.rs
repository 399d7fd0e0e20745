//! The external streaming service's live playlists.
//!
//! The service only exposes single-element insert/remove/move calls, so edits
//! reach it as a [`LiveOp`] stream executed one awaited call at a time.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::object::{PlaylistId, TrackId};
use crate::sequence::LiveOp;
use crate::storage::write_atomic;

/// Live playlist API of the external service
#[async_trait]
pub trait LiveService: Send + Sync {
    async fn current_sequence(&self, playlist: &PlaylistId) -> Result<Vec<TrackId>>;

    async fn insert(&self, playlist: &PlaylistId, track: &TrackId, at: usize) -> Result<()>;

    async fn remove_at(&self, playlist: &PlaylistId, offset: usize) -> Result<()>;

    /// Take the track at `from` out and reinsert it so it ends up at `to`.
    async fn move_track(&self, playlist: &PlaylistId, from: usize, to: usize) -> Result<()>;

    /// Create (or overwrite) a playlist with the given tracks.
    async fn create_playlist(&self, playlist: &PlaylistId, tracks: &[TrackId]) -> Result<()>;
}

/// Execute `ops` against the live playlist, in order, one call each.
pub async fn execute_ops<L>(service: &L, playlist: &PlaylistId, ops: &[LiveOp<TrackId>]) -> Result<()>
where
    L: LiveService + ?Sized,
{
    if ops.is_empty() {
        return Ok(());
    }
    tracing::info!("Replaying {} op(s) onto live playlist {}", ops.len(), playlist);

    let pb = if ops.len() > 10 {
        let bar = ProgressBar::new(ops.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("  {msg} [{bar:40.cyan/blue}] {pos}/{len} ops ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        bar.set_message("Updating live playlist");
        Some(bar)
    } else {
        None
    };

    for op in ops {
        tracing::debug!("live op on {}: {:?}", playlist, op);
        match op {
            LiveOp::Remove { offset, .. } => service.remove_at(playlist, *offset).await?,
            LiveOp::Insert { offset, value } => service.insert(playlist, value, *offset).await?,
            LiveOp::Move { from, to, .. } => service.move_track(playlist, *from, *to).await?,
        }
        if let Some(ref bar) = pb {
            bar.inc(1);
        }
    }

    if let Some(ref bar) = pb {
        bar.finish_with_message("Live playlist updated");
    }
    Ok(())
}

fn remove(tracks: &mut Vec<TrackId>, offset: usize) -> Result<TrackId> {
    if offset >= tracks.len() {
        return Err(Error::OutOfRange {
            index: offset,
            len: tracks.len(),
        });
    }
    Ok(tracks.remove(offset))
}

fn insert(tracks: &mut Vec<TrackId>, track: TrackId, at: usize) -> Result<()> {
    if at > tracks.len() {
        return Err(Error::OutOfRange {
            index: at,
            len: tracks.len(),
        });
    }
    tracks.insert(at, track);
    Ok(())
}

fn move_within(tracks: &mut Vec<TrackId>, from: usize, to: usize) -> Result<()> {
    if to >= tracks.len() {
        return Err(Error::OutOfRange {
            index: to,
            len: tracks.len(),
        });
    }
    let track = remove(tracks, from)?;
    tracks.insert(to, track);
    Ok(())
}

/// In-process live service. Counts calls so callers can check op economy.
#[derive(Default)]
pub struct MemoryLiveService {
    playlists: Mutex<HashMap<PlaylistId, Vec<TrackId>>>,
    calls: AtomicUsize,
}

impl MemoryLiveService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a playlist as an out-of-band edit would
    pub async fn set(&self, playlist: &PlaylistId, tracks: Vec<TrackId>) {
        self.playlists.lock().await.insert(playlist.clone(), tracks);
    }

    /// Number of mutating calls served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn edit<F>(&self, playlist: &PlaylistId, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<TrackId>) -> Result<()> + Send,
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut playlists = self.playlists.lock().await;
        let tracks = playlists
            .get_mut(playlist)
            .ok_or_else(|| Error::transport(format!("live playlist {} not found", playlist)))?;
        edit(tracks)
    }
}

#[async_trait]
impl LiveService for MemoryLiveService {
    async fn current_sequence(&self, playlist: &PlaylistId) -> Result<Vec<TrackId>> {
        self.playlists
            .lock()
            .await
            .get(playlist)
            .cloned()
            .ok_or_else(|| Error::transport(format!("live playlist {} not found", playlist)))
    }

    async fn insert(&self, playlist: &PlaylistId, track: &TrackId, at: usize) -> Result<()> {
        let track = track.clone();
        self.edit(playlist, move |tracks| insert(tracks, track, at))
            .await
    }

    async fn remove_at(&self, playlist: &PlaylistId, offset: usize) -> Result<()> {
        self.edit(playlist, move |tracks| remove(tracks, offset).map(|_| ()))
            .await
    }

    async fn move_track(&self, playlist: &PlaylistId, from: usize, to: usize) -> Result<()> {
        self.edit(playlist, move |tracks| move_within(tracks, from, to))
            .await
    }

    async fn create_playlist(&self, playlist: &PlaylistId, tracks: &[TrackId]) -> Result<()> {
        self.set(playlist, tracks.to_vec()).await;
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlaylistFile {
    #[serde(default)]
    tracks: Vec<TrackId>,
}

/// Live service backed by one YAML file per playlist under a directory.
///
/// Stands in for the streaming service when driving the CLI locally; editing
/// a file by hand is an out-of-band change.
pub struct FileLiveService {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileLiveService {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(FileLiveService {
            dir: dir.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    /// `<dir>/<playlist>.yaml`; ids that would leave `dir` are rejected.
    fn path(&self, playlist: &PlaylistId) -> Result<PathBuf> {
        let id = playlist.as_str();
        if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\', '\0']) {
            return Err(Error::InvalidPlaylistId(playlist.clone()));
        }
        Ok(self.dir.join(format!("{}.yaml", id)))
    }

    fn load(&self, playlist: &PlaylistId) -> Result<Vec<TrackId>> {
        let path = self.path(playlist)?;
        if !path.exists() {
            return Err(Error::transport(format!(
                "live playlist {} not found at {:?}",
                playlist, path
            )));
        }
        let content = fs::read_to_string(&path)?;
        let file: PlaylistFile = serde_yaml::from_str(&content)?;
        Ok(file.tracks)
    }

    fn store(&self, playlist: &PlaylistId, tracks: Vec<TrackId>) -> Result<()> {
        let content = serde_yaml::to_string(&PlaylistFile { tracks })?;
        write_atomic(&self.dir, &self.path(playlist)?, content.as_bytes())
    }

    async fn edit<F>(&self, playlist: &PlaylistId, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<TrackId>) -> Result<()> + Send,
    {
        let _guard = self.lock.lock().await;
        let mut tracks = self.load(playlist)?;
        edit(&mut tracks)?;
        self.store(playlist, tracks)
    }
}

#[async_trait]
impl LiveService for FileLiveService {
    async fn current_sequence(&self, playlist: &PlaylistId) -> Result<Vec<TrackId>> {
        let _guard = self.lock.lock().await;
        self.load(playlist)
    }

    async fn insert(&self, playlist: &PlaylistId, track: &TrackId, at: usize) -> Result<()> {
        let track = track.clone();
        self.edit(playlist, move |tracks| insert(tracks, track, at))
            .await
    }

    async fn remove_at(&self, playlist: &PlaylistId, offset: usize) -> Result<()> {
        self.edit(playlist, move |tracks| remove(tracks, offset).map(|_| ()))
            .await
    }

    async fn move_track(&self, playlist: &PlaylistId, from: usize, to: usize) -> Result<()> {
        self.edit(playlist, move |tracks| move_within(tracks, from, to))
            .await
    }

    async fn create_playlist(&self, playlist: &PlaylistId, tracks: &[TrackId]) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.store(playlist, tracks.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::sequence::{checked_replay_ops, diff_sequences};

    fn tracks(ids: &str) -> Vec<TrackId> {
        ids.chars().map(|c| TrackId::new(c.to_string())).collect()
    }

    #[tokio::test]
    async fn test_execute_ops_one_call_per_op() {
        let service = MemoryLiveService::new();
        let playlist = PlaylistId::from("p1");
        service.set(&playlist, tracks("abcdef")).await;

        let script = diff_sequences(&tracks("abcdef"), &tracks("axdbcefz"));
        let ops = checked_replay_ops(&script).unwrap();
        execute_ops(&service, &playlist, &ops).await.unwrap();

        assert_eq!(
            service.current_sequence(&playlist).await.unwrap(),
            tracks("axdbcefz")
        );
        assert_eq!(service.calls(), 3);
    }

    #[tokio::test]
    async fn test_memory_service_bounds() {
        let service = MemoryLiveService::new();
        let playlist = PlaylistId::from("p1");
        service.set(&playlist, tracks("ab")).await;

        assert!(matches!(
            service.remove_at(&playlist, 2).await,
            Err(Error::OutOfRange { index: 2, len: 2 })
        ));
        assert!(service.move_track(&playlist, 0, 2).await.is_err());
        assert!(service
            .insert(&playlist, &TrackId::from("c"), 2)
            .await
            .is_ok());
        assert!(matches!(
            service.current_sequence(&PlaylistId::from("nope")).await,
            Err(Error::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_file_service_persists_edits() {
        let temp = TempDir::new().unwrap();
        let service = FileLiveService::new(temp.path()).unwrap();
        let playlist = PlaylistId::from("road-trip");

        service
            .create_playlist(&playlist, &tracks("abc"))
            .await
            .unwrap();
        service.move_track(&playlist, 0, 2).await.unwrap();
        service.remove_at(&playlist, 0).await.unwrap();
        service
            .insert(&playlist, &TrackId::from("z"), 0)
            .await
            .unwrap();

        let reopened = FileLiveService::new(temp.path()).unwrap();
        assert_eq!(
            reopened.current_sequence(&playlist).await.unwrap(),
            tracks("zca")
        );
    }

    #[tokio::test]
    async fn test_file_service_rejects_escaping_ids() {
        let temp = TempDir::new().unwrap();
        let service = FileLiveService::new(temp.path().join("live")).unwrap();

        for id in ["../outside", "a/b", "..", ""] {
            let playlist = PlaylistId::from(id);
            assert!(matches!(
                service.create_playlist(&playlist, &tracks("a")).await,
                Err(Error::InvalidPlaylistId(_))
            ));
            assert!(matches!(
                service.current_sequence(&playlist).await,
                Err(Error::InvalidPlaylistId(_))
            ));
        }
        assert!(!temp.path().join("outside.yaml").exists());
    }

    #[tokio::test]
    async fn test_file_service_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let service = FileLiveService::new(temp.path()).unwrap();
        let playlist = PlaylistId::from("mix");
        service
            .create_playlist(&playlist, &tracks("ab"))
            .await
            .unwrap();
        service.move_track(&playlist, 0, 1).await.unwrap();

        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["mix.yaml".to_string()]);
    }
}
