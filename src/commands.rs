use std::io::Write;

use anyhow::{bail, Context, Result};
use playlist_vcs::config::Config;
use playlist_vcs::live::FileLiveService;
use playlist_vcs::remote::FilesystemAuthority;
use playlist_vcs::sequence::{ChangeState, VisualEntry};
use playlist_vcs::storage::FilesystemStorage;
use playlist_vcs::{Conflict, Hash, PlaylistId, SyncClient, TrackId};

pub mod commit;
pub mod edit;
pub mod init;
pub mod pull;
pub mod push;
pub mod resolve;
pub mod status;

/// Client wired to filesystem collaborators
pub type Client = SyncClient<FilesystemStorage, FilesystemAuthority<FileLiveService>>;

pub fn open_client(config: &Config) -> Result<Client> {
    let live = FileLiveService::new(&config.live_dir)
        .with_context(|| format!("Failed to open live playlists at {:?}", config.live_dir))?;
    let authority = FilesystemAuthority::open(&config.remote_dir, live)
        .with_context(|| format!("Failed to open remote at {:?}", config.remote_dir))?;
    let storage = FilesystemStorage::new(&config.store_dir)?;
    SyncClient::new(config.author_id.clone(), storage, authority)
        .with_context(|| format!("Failed to open local store at {:?}", config.store_dir))
}

/// Resolve `HEAD`, `SYNC`, or a full or abbreviated hash of a commit in the
/// playlist's history. An outstanding remote conflict adds the remote head's
/// history to the candidates.
pub fn resolve_rev(client: &Client, playlist: &PlaylistId, rev: &str) -> Result<Hash> {
    let clone = client.clone_of(playlist)?;
    match rev {
        "HEAD" => return Ok(clone.head),
        "SYNC" => return Ok(clone.last_sync),
        _ => {}
    }

    let mut known: Vec<Hash> = client
        .log(playlist, None)?
        .into_iter()
        .map(|(hash, _)| hash)
        .collect();
    if let Some(Conflict::Remote { remote_head }) = &clone.conflict {
        for (hash, _) in client.store().history(remote_head, None)? {
            if !known.contains(&hash) {
                known.push(hash);
            }
        }
    }

    if let Ok(hash) = rev.parse::<Hash>() {
        if known.contains(&hash) {
            return Ok(hash);
        }
        bail!("{} is not a commit in the history of {}", hash.short(), playlist);
    }

    let matches: Vec<Hash> = known
        .into_iter()
        .filter(|hash| hash.to_hex().starts_with(rev))
        .collect();
    match matches.as_slice() {
        [hash] => Ok(*hash),
        [] => bail!("No commit matching '{}' in the history of {}", rev, playlist),
        _ => bail!("'{}' is ambiguous: {} commits match", rev, matches.len()),
    }
}

/// Print a unified change list, one row per entry.
pub fn write_changes<W: Write>(output: &mut W, entries: &[VisualEntry<TrackId>]) -> Result<()> {
    for (row, entry) in entries.iter().enumerate() {
        match entry.state {
            ChangeState::Unchanged => writeln!(output, "{:>4}   {}", row, entry.value)?,
            ChangeState::Removed { moved_to: None } => {
                writeln!(output, "{:>4} - {}", row, entry.value)?
            }
            ChangeState::Removed { moved_to: Some(to) } => {
                writeln!(output, "{:>4} - {}  (moved to row {})", row, entry.value, to)?
            }
            ChangeState::Inserted { moved_from: None } => {
                writeln!(output, "{:>4} + {}", row, entry.value)?
            }
            ChangeState::Inserted {
                moved_from: Some(from),
            } => writeln!(output, "{:>4} + {}  (moved from row {})", row, entry.value, from)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use playlist_vcs::live::LiveService;
    use playlist_vcs::sequence::{diff_sequences, visual_diff};
    use playlist_vcs::{AuthorId, PlaylistMetadata};
    use tempfile::TempDir;

    use super::*;

    fn tracks(ids: &str) -> Vec<TrackId> {
        ids.chars().map(|c| TrackId::new(c.to_string())).collect()
    }

    #[test]
    fn test_write_changes_marks_moves() {
        let entries = visual_diff(&diff_sequences(&tracks("abc"), &tracks("cab"))).unwrap();
        let mut output = Vec::new();
        write_changes(&mut output, &entries).unwrap();

        let text = String::from_utf8(output).unwrap();
        assert_eq!(
            text,
            "   0 + c  (moved from row 3)\n   1   a\n   2   b\n   3 - c  (moved to row 0)\n"
        );
    }

    #[tokio::test]
    async fn test_resolve_rev_only_accepts_history_commits() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            author_id: AuthorId::from("tester"),
            store_dir: temp.path().join("store"),
            remote_dir: temp.path().join("remote"),
            live_dir: temp.path().join("live"),
        };
        let playlist = PlaylistId::from("road-trip");
        FileLiveService::new(&config.live_dir)
            .unwrap()
            .create_playlist(&playlist, &tracks("abc"))
            .await
            .unwrap();

        let client = open_client(&config).unwrap();
        client
            .init_or_clone(&playlist, PlaylistMetadata::default())
            .await
            .unwrap();
        let head = client.clone_of(&playlist).unwrap().head;

        assert_eq!(resolve_rev(&client, &playlist, "HEAD").unwrap(), head);
        assert_eq!(resolve_rev(&client, &playlist, &head.to_hex()).unwrap(), head);
        assert_eq!(resolve_rev(&client, &playlist, &head.short()).unwrap(), head);

        // A blob hash is well formed but names no commit
        let blob = client.store().commit(&head).unwrap().blob;
        let err = resolve_rev(&client, &playlist, &blob.to_hex()).unwrap_err();
        assert!(err.to_string().contains("not a commit in the history"));
    }
}
