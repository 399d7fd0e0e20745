use std::io::Write;

use anyhow::{Context, Result};
use playlist_vcs::{Initialized, PlaylistId, PlaylistMetadata};

use super::Client;

/// Handle the init command
/// Clone the playlist from the remote, or register it from its live tracks
pub async fn handle<W: Write>(
    client: &Client,
    output: &mut W,
    playlist: &PlaylistId,
    name: String,
    description: String,
) -> Result<()> {
    let name = if name.is_empty() {
        playlist.to_string()
    } else {
        name
    };
    let initialized = client
        .init_or_clone(playlist, PlaylistMetadata::new(name, description))
        .await
        .with_context(|| format!("Failed to initialize {}", playlist))?;

    match initialized {
        Initialized::Created { head } => {
            writeln!(output, "Initialized {} at {}", playlist, head.short())?
        }
        Initialized::Cloned { head } => writeln!(output, "Cloned {} at {}", playlist, head.short())?,
    }
    Ok(())
}

pub async fn fork<W: Write>(
    client: &Client,
    output: &mut W,
    source: &PlaylistId,
    target: &PlaylistId,
    name: Option<String>,
) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => format!("{} (fork)", client.clone_of(source)?.name),
    };
    let head = client
        .fork(source, target, name)
        .await
        .with_context(|| format!("Failed to fork {} into {}", source, target))?;
    writeln!(output, "Forked {} into {} at {}", source, target, head.short())?;
    Ok(())
}

pub async fn delete<W: Write>(client: &Client, output: &mut W, playlist: &PlaylistId) -> Result<()> {
    client.delete_clone(playlist).await?;
    writeln!(output, "Deleted local clone of {}", playlist)?;
    Ok(())
}
