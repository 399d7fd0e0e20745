use std::io::Write;

use anyhow::{Context, Result};
use playlist_vcs::remote::PushOutcome;
use playlist_vcs::PlaylistId;

use super::Client;

/// Handle the push command
pub async fn handle<W: Write>(client: &Client, output: &mut W, playlist: &PlaylistId) -> Result<()> {
    let outcome = client
        .push(playlist)
        .await
        .with_context(|| format!("Failed to push {}", playlist))?;

    match outcome {
        PushOutcome::Success { commit } => {
            writeln!(output, "Pushed {}; live playlist updated", commit.short())?
        }
        PushOutcome::RemoteUpdates { latest_sync, .. } => writeln!(
            output,
            "Rejected: remote has newer commits (up to {}). Pull, then push again",
            latest_sync.short()
        )?,
        PushOutcome::ExternalUpdates { live } => writeln!(
            output,
            "Rejected: live playlist ({} tracks) was edited outside version control. \
             Review with `diff`, then `resolve external`",
            live.len()
        )?,
    }
    Ok(())
}
