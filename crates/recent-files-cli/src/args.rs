use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "recent-files")]
#[command(
    about = "Track recently opened documents and cache them for instant reopen",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record that a document was opened
    Open {
        path: PathBuf,

        /// Display name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        zoom: Option<f64>,

        /// Degrees, a multiple of 90
        #[arg(long, allow_negative_numbers = true)]
        rotation: Option<i64>,

        /// Track the document without caching its bytes
        #[arg(long)]
        no_cache: bool,
    },

    /// List recent documents, most recent first
    #[command(alias = "ls")]
    List {
        /// Only show documents whose name or location contains this
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show details for one document
    Info { fingerprint: String },

    /// Read a document's cached bytes
    Fetch {
        fingerprint: String,

        /// Write the bytes here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Update where the reader is in a document
    View {
        fingerprint: String,

        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        zoom: Option<f64>,

        #[arg(long, allow_negative_numbers = true)]
        rotation: Option<i64>,

        #[arg(long, allow_negative_numbers = true)]
        scroll_x: Option<f64>,

        #[arg(long, allow_negative_numbers = true)]
        scroll_y: Option<f64>,
    },

    /// Mark a document as having unsaved edits, or not
    Edits {
        fingerprint: String,
        #[arg(action = clap::ArgAction::Set)]
        has_edits: bool,
    },

    /// Replace a document's cached bytes with a file's contents
    Replace { fingerprint: String, path: PathBuf },

    /// Store an encoded preview image
    Thumbnail {
        fingerprint: String,
        encoded: String,
    },

    /// Forget a document
    #[command(alias = "rm")]
    Remove { fingerprint: String },

    /// Forget every document
    Clear,

    /// Purge cached content past the retention window
    Sweep,

    /// Registry and cache totals
    Stats,
}
