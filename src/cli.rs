// src/cli.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Mine git history into a per-file hotspot table", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Walk a repository's history and record one snapshot per touched file
    Ingest {
        /// Path to the git repository to ingest
        #[arg(short, long)]
        repo: PathBuf,

        /// Destination store: a path, a sqlite:// URL or :memory:
        #[arg(long, env = "HOTSPOT_DB", default_value = "hotspots.db")]
        db: String,

        /// JSON weights for the 4-16-1 network; the built-in scorer is used otherwise
        #[arg(long)]
        model: Option<PathBuf>,

        /// Do not draw a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Write labeled snapshots as JSON lines for model training
    Export {
        #[arg(long, env = "HOTSPOT_DB", default_value = "hotspots.db")]
        db: String,

        /// Output file, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print row counts and the span of the ingested history
    Summary {
        #[arg(long, env = "HOTSPOT_DB", default_value = "hotspots.db")]
        db: String,
    },

    /// Print a file's contents as of a commit
    Blob {
        #[arg(short, long)]
        repo: PathBuf,

        #[arg(short, long)]
        commit: String,

        #[arg(short, long)]
        path: String,
    },
}
