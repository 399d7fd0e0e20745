use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use playlist_vcs::config::Config;
use playlist_vcs::{PlaylistId, TrackId};

use crate::commands;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(after_help = concat!(
    "Environment variables:\n",
    "  PLAYLIST_VCS_LOG         Log filter (default: info)\n",
    "  PLAYLIST_VCS_AUTHOR      Author recorded on commits\n",
    "  PLAYLIST_VCS_STORE_DIR   Local object store\n",
    "  PLAYLIST_VCS_REMOTE_DIR  Filesystem remote authority\n",
    "  PLAYLIST_VCS_LIVE_DIR    Live playlist files\n\n",
    "Examples:\n",
    "  # Start tracking a playlist (clones it if the remote already knows it)\n",
    "  $ playlist-vcs init road-trip --name 'Road trip'\n\n",
    "  # Stage edits, commit and push them to the live playlist\n",
    "  $ playlist-vcs add road-trip 4uLU6hMCjMI75M1A2tKUQC --at 0\n",
    "  $ playlist-vcs mv road-trip 3 1\n",
    "  $ playlist-vcs commit road-trip -m 'Open with the classics'\n",
    "  $ playlist-vcs push road-trip\n\n",
    "  # Someone edited the playlist in the streaming app\n",
    "  $ playlist-vcs push road-trip\n",
    "  $ playlist-vcs diff road-trip\n",
    "  $ playlist-vcs resolve external road-trip --take theirs"
))]
pub struct RootCommand {
    /// Config file to load instead of ~/.config/playlist-vcs/config.yaml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub action: SubCommands,
}

#[derive(Debug, Subcommand)]
pub enum SubCommands {
    /// Start tracking a playlist, cloning it if the remote already has it
    Init {
        playlist: PlaylistId,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Create a new playlist whose history starts from another's HEAD
    Fork {
        source: PlaylistId,
        target: PlaylistId,
        #[arg(long)]
        name: Option<String>,
    },
    /// Show sync state and uncommitted changes
    Status { playlist: PlaylistId },
    /// Stage a track insertion (appends by default)
    Add {
        playlist: PlaylistId,
        track: TrackId,
        #[arg(long)]
        at: Option<usize>,
    },
    /// Stage removal of the track at INDEX
    Rm { playlist: PlaylistId, index: usize },
    /// Stage moving the track at FROM so it ends up at TO
    Mv {
        playlist: PlaylistId,
        from: usize,
        to: usize,
    },
    /// Stage a new playlist name or description
    Rename {
        playlist: PlaylistId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Commit {
        playlist: PlaylistId,
        #[arg(short, long)]
        message: String,
    },
    Log {
        playlist: PlaylistId,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Replace staging with the tracks of a commit
    Checkout { playlist: PlaylistId, commit: String },
    /// Drop uncommitted changes
    Discard { playlist: PlaylistId },
    /// Diff two commits (default: last sync to HEAD), or the conflict sides
    Diff {
        playlist: PlaylistId,
        from: Option<String>,
        to: Option<String>,
    },
    Push { playlist: PlaylistId },
    Pull { playlist: PlaylistId },
    /// Settle an outstanding conflict
    Resolve {
        #[command(subcommand)]
        kind: ResolveKind,
    },
    /// Forget the local clone of a playlist
    Delete { playlist: PlaylistId },
}

#[derive(Debug, Subcommand)]
pub enum ResolveKind {
    /// Merge with the newer remote history
    Remote {
        playlist: PlaylistId,
        #[arg(long, value_enum, default_value_t = Side::Ours)]
        take: Side,
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Fold edits made directly on the streaming service into a commit
    External {
        playlist: PlaylistId,
        #[arg(long, value_enum, default_value_t = Side::Theirs)]
        take: Side,
        #[arg(short, long)]
        message: Option<String>,
    },
}

/// Which sequence a resolution keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Side {
    /// The local staging sequence
    Ours,
    /// The remote head's sequence, or the live sequence
    Theirs,
}

impl RootCommand {
    pub async fn run(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => {
                let mut config = Config::load_from_file(path)?;
                config.apply_env(|key| std::env::var(key).ok());
                config
            }
            None => Config::load()?,
        };
        let client = commands::open_client(&config)?;
        let mut stdout = io::stdout();

        match self.action {
            SubCommands::Init {
                playlist,
                name,
                description,
            } => commands::init::handle(&client, &mut stdout, &playlist, name, description).await,
            SubCommands::Fork {
                source,
                target,
                name,
            } => commands::init::fork(&client, &mut stdout, &source, &target, name).await,
            SubCommands::Delete { playlist } => {
                commands::init::delete(&client, &mut stdout, &playlist).await
            }
            SubCommands::Status { playlist } => {
                commands::status::handle(&client, &mut stdout, &playlist)
            }
            SubCommands::Add {
                playlist,
                track,
                at,
            } => commands::edit::add(&client, &mut stdout, &playlist, track, at).await,
            SubCommands::Rm { playlist, index } => {
                commands::edit::remove(&client, &mut stdout, &playlist, index).await
            }
            SubCommands::Mv { playlist, from, to } => {
                commands::edit::move_track(&client, &mut stdout, &playlist, from, to).await
            }
            SubCommands::Rename {
                playlist,
                name,
                description,
            } => commands::edit::rename(&client, &mut stdout, &playlist, name, description).await,
            SubCommands::Checkout { playlist, commit } => {
                commands::edit::checkout(&client, &mut stdout, &playlist, &commit).await
            }
            SubCommands::Discard { playlist } => {
                commands::edit::discard(&client, &mut stdout, &playlist).await
            }
            SubCommands::Commit { playlist, message } => {
                commands::commit::handle(&client, &mut stdout, &playlist, &message).await
            }
            SubCommands::Log { playlist, limit } => {
                commands::status::log(&client, &mut stdout, &playlist, limit)
            }
            SubCommands::Diff { playlist, from, to } => commands::status::diff(
                &client,
                &mut stdout,
                &playlist,
                from.as_deref(),
                to.as_deref(),
            ),
            SubCommands::Push { playlist } => {
                commands::push::handle(&client, &mut stdout, &playlist).await
            }
            SubCommands::Pull { playlist } => {
                commands::pull::handle(&client, &mut stdout, &playlist).await
            }
            SubCommands::Resolve { kind } => match kind {
                ResolveKind::Remote {
                    playlist,
                    take,
                    message,
                } => commands::resolve::remote(&client, &mut stdout, &playlist, take, message).await,
                ResolveKind::External {
                    playlist,
                    take,
                    message,
                } => {
                    commands::resolve::external(&client, &mut stdout, &playlist, take, message)
                        .await
                }
            },
        }
    }
}
