use std::io::Write;

use anyhow::{Context, Result};
use playlist_vcs::PlaylistId;

use super::Client;
use crate::cli::Side;

/// Merge the remote head into HEAD, keeping the chosen side's tracks
pub async fn remote<W: Write>(
    client: &Client,
    output: &mut W,
    playlist: &PlaylistId,
    take: Side,
    message: Option<String>,
) -> Result<()> {
    let tracks = match take {
        Side::Ours => client.clone_of(playlist)?.staging,
        Side::Theirs => client.conflict_sequence(playlist)?,
    };
    let message = message.unwrap_or_else(|| "Merge remote history".to_string());
    let merge = client
        .resolve_remote(playlist, tracks, &message)
        .await
        .with_context(|| format!("Failed to resolve remote conflict on {}", playlist))?;
    writeln!(output, "[{}] {}", merge.short(), message)?;
    Ok(())
}

/// Commit the chosen side over a drifted live playlist
pub async fn external<W: Write>(
    client: &Client,
    output: &mut W,
    playlist: &PlaylistId,
    take: Side,
    message: Option<String>,
) -> Result<()> {
    let tracks = match take {
        Side::Ours => client.clone_of(playlist)?.staging,
        Side::Theirs => client.conflict_sequence(playlist)?,
    };
    let message = message.unwrap_or_else(|| "Fold in live playlist edits".to_string());
    let head = client
        .resolve_external(playlist, tracks, &message)
        .await
        .with_context(|| format!("Failed to resolve live drift on {}", playlist))?;
    writeln!(output, "[{}] {}", head.short(), message)?;
    Ok(())
}
