use std::io::Write;

use anyhow::{Context, Result};
use playlist_vcs::PlaylistId;

use super::Client;

/// Handle the commit command
pub async fn handle<W: Write>(
    client: &Client,
    output: &mut W,
    playlist: &PlaylistId,
    message: &str,
) -> Result<()> {
    let head = client
        .commit(playlist, message)
        .await
        .with_context(|| format!("Failed to commit to {}", playlist))?;
    writeln!(output, "[{}] {}", head.short(), message)?;
    Ok(())
}
