use std::io::Write;

use anyhow::Result;
use playlist_vcs::sequence::ChangeState;
use playlist_vcs::{Conflict, PlaylistId};

use super::{resolve_rev, write_changes, Client};

/// Handle the status command
pub fn handle<W: Write>(client: &Client, output: &mut W, playlist: &PlaylistId) -> Result<()> {
    let status = client.status(playlist)?;
    let clone = client.clone_of(playlist)?;

    writeln!(output, "Playlist {} ({})", playlist, clone.name)?;
    if let Some(parent) = &clone.fork_parent {
        writeln!(output, "Forked from {}", parent)?;
    }
    writeln!(output, "HEAD {}  last sync {}", status.head.short(), status.last_sync.short())?;
    writeln!(output, "State: {}", status.state)?;

    match &status.conflict {
        Some(Conflict::Remote { remote_head }) => writeln!(
            output,
            "Remote history moved to {}; run `resolve remote` after reviewing `diff`",
            remote_head.short()
        )?,
        Some(Conflict::External { live }) => writeln!(
            output,
            "Live playlist was edited outside version control ({} tracks); run `resolve external`",
            live.len()
        )?,
        None => {}
    }

    let changed = status
        .changes
        .iter()
        .any(|e| e.state != ChangeState::Unchanged);
    if changed {
        writeln!(output)?;
        write_changes(output, &status.changes)?;
    }
    Ok(())
}

pub fn log<W: Write>(
    client: &Client,
    output: &mut W,
    playlist: &PlaylistId,
    limit: Option<usize>,
) -> Result<()> {
    let clone = client.clone_of(playlist)?;
    for (hash, commit) in client.log(playlist, limit)? {
        let mut markers = Vec::new();
        if hash == clone.head {
            markers.push("HEAD");
        }
        if hash == clone.last_sync {
            markers.push("SYNC");
        }
        let markers = if markers.is_empty() {
            String::new()
        } else {
            format!(" ({})", markers.join(", "))
        };

        writeln!(output, "commit {}{}", hash, markers)?;
        if commit.is_merge() {
            let parents: Vec<String> = commit.parents.iter().map(|p| p.short()).collect();
            writeln!(output, "Merge: {}", parents.join(" "))?;
        }
        writeln!(output, "Author: {}", commit.author)?;
        writeln!(output, "Date:   {}", commit.timestamp.to_rfc3339())?;
        writeln!(output)?;
        writeln!(output, "    {}", commit.message)?;
        writeln!(output)?;
    }
    Ok(())
}

/// Handle the diff command
/// With no revisions: HEAD against the other side when conflicted, otherwise
/// last sync against HEAD.
pub fn diff<W: Write>(
    client: &Client,
    output: &mut W,
    playlist: &PlaylistId,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<()> {
    let clone = client.clone_of(playlist)?;
    if from.is_none() && to.is_none() && clone.is_conflicted() {
        writeln!(output, "HEAD against the conflicting sequence:")?;
        return write_changes(output, &client.conflict_diff(playlist)?);
    }

    let from = resolve_rev(client, playlist, from.unwrap_or("SYNC"))?;
    let to = resolve_rev(client, playlist, to.unwrap_or("HEAD"))?;
    write_changes(output, &client.diff(&from, &to)?)
}
