use std::io::Write;

use anyhow::Result;
use playlist_vcs::{PlaylistId, TrackId};

use super::{resolve_rev, Client};

pub async fn add<W: Write>(
    client: &Client,
    output: &mut W,
    playlist: &PlaylistId,
    track: TrackId,
    at: Option<usize>,
) -> Result<()> {
    let at = match at {
        Some(at) => at,
        None => client.clone_of(playlist)?.staging.len(),
    };
    client.insert(playlist, at, track.clone()).await?;
    writeln!(output, "Staged {} at {}", track, at)?;
    Ok(())
}

pub async fn remove<W: Write>(
    client: &Client,
    output: &mut W,
    playlist: &PlaylistId,
    index: usize,
) -> Result<()> {
    let track = client.remove(playlist, index).await?;
    writeln!(output, "Staged removal of {} from {}", track, index)?;
    Ok(())
}

pub async fn move_track<W: Write>(
    client: &Client,
    output: &mut W,
    playlist: &PlaylistId,
    from: usize,
    to: usize,
) -> Result<()> {
    client.move_track(playlist, from, to).await?;
    writeln!(output, "Staged move {} -> {}", from, to)?;
    Ok(())
}

pub async fn rename<W: Write>(
    client: &Client,
    output: &mut W,
    playlist: &PlaylistId,
    name: Option<String>,
    description: Option<String>,
) -> Result<()> {
    if name.is_none() && description.is_none() {
        anyhow::bail!("Nothing to rename: pass --name and/or --description");
    }
    client.set_metadata(playlist, name, description).await?;
    let clone = client.clone_of(playlist)?;
    writeln!(output, "Staged name '{}', description '{}'", clone.name, clone.description)?;
    Ok(())
}

pub async fn checkout<W: Write>(
    client: &Client,
    output: &mut W,
    playlist: &PlaylistId,
    rev: &str,
) -> Result<()> {
    let commit = resolve_rev(client, playlist, rev)?;
    client.checkout(playlist, &commit).await?;
    writeln!(output, "Staging now matches {}", commit.short())?;
    Ok(())
}

pub async fn discard<W: Write>(client: &Client, output: &mut W, playlist: &PlaylistId) -> Result<()> {
    client.discard(playlist).await?;
    writeln!(output, "Discarded uncommitted changes to {}", playlist)?;
    Ok(())
}
