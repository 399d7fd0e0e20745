use std::io::Write;

use anyhow::{Context, Result};
use playlist_vcs::{PlaylistId, PullOutcome};

use super::Client;

/// Handle the pull command
pub async fn handle<W: Write>(client: &Client, output: &mut W, playlist: &PlaylistId) -> Result<()> {
    let outcome = client
        .pull(playlist)
        .await
        .with_context(|| format!("Failed to pull {}", playlist))?;

    match outcome {
        PullOutcome::UpToDate => writeln!(output, "Already up to date")?,
        PullOutcome::Ahead => writeln!(output, "Local history is ahead of the remote; push to publish")?,
        PullOutcome::FastForwarded { head } => writeln!(output, "Fast-forwarded to {}", head.short())?,
        PullOutcome::StagingDirty { remote_head } => writeln!(
            output,
            "Remote is at {} but staging has uncommitted changes; commit or discard first",
            remote_head.short()
        )?,
        PullOutcome::Diverged { remote_head } => writeln!(
            output,
            "History diverged from remote {}; review with `diff`, then `resolve remote`",
            remote_head.short()
        )?,
    }
    Ok(())
}
