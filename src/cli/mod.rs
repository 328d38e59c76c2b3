pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "saved-feed")]
#[command(about = "Mirror Reddit saved items into an RSS feed", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/saved-feed/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding the config
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Keep syncing in the background until interrupted
    Daemon {
        /// Write the RSS feed to this file after every sync
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Sync interval (e.g., "90s", "15m", "1h"), overriding the config
        #[arg(short, long)]
        interval: Option<String>,

        /// Serve the feed over HTTP on this address, overriding the config
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// Pull new saved items once
    Sync,
    /// Print the RSS feed built from the local store
    Render {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List stored items
    List,
}
