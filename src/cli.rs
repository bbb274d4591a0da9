use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "upnext")]
#[command(author, version, about = "Continue-watching and next-episode engine")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the continue-watching list once and print it
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Keep the list fresh and print it whenever it changes
    Watch,

    /// Inspect or edit stored watch progress
    Progress {
        #[command(subcommand)]
        action: ProgressAction,
    },

    /// Remove a title from continue watching
    Remove {
        /// Content type (movie or series)
        content_type: String,

        /// Content id, e.g. tt0944947
        content_id: String,
    },

    /// Parse an episode key and print the season and episode
    ParseKey {
        /// Episode key, e.g. tt0944947:2:3 or s02e03
        key: String,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
pub enum ProgressAction {
    /// Record a playback position
    Set {
        /// Content type (movie or series)
        content_type: String,

        /// Content id
        content_id: String,

        /// Episode key for series progress
        #[arg(long)]
        episode_key: Option<String>,

        /// Position in seconds
        #[arg(long)]
        position: f64,

        /// Duration in seconds
        #[arg(long)]
        duration: f64,

        /// Timestamp in epoch milliseconds (defaults to now)
        #[arg(long)]
        at: Option<i64>,

        /// Bypass the lower-progress guard
        #[arg(long)]
        force: bool,
    },

    /// Remove one record by its `type:contentId[:episodeKey]` key
    Remove {
        key: String,
    },

    /// Print every stored record
    Dump {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
