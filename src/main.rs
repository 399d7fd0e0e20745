#![deny(clippy::mod_module_files)]
use std::env::var;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, registry, EnvFilter};

mod cli;
mod commands;

use cli::RootCommand;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let command = RootCommand::parse();
    command.run().await
}

fn setup() -> Result<()> {
    let directives = match var("PLAYLIST_VCS_LOG") {
        Ok(value) if !value.trim().is_empty() => value,
        _ => "info".to_owned(),
    };

    // stdout is reserved for command output
    registry()
        .with(EnvFilter::builder().parse(directives)?)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
