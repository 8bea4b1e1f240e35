//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "resen")]
#[command(author, version, about = "Manage container-backed development buckets", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubCommand,

    /// Output format as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration directory (defaults to the platform config dir)
    #[arg(long, global = true, env = "RESEN_CONFIG_DIR", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum SubCommand {
    /// Create a new, empty bucket
    Create {
        bucket: String,
    },

    /// List buckets, or show one bucket in detail
    List {
        /// Show this bucket only
        bucket: Option<String>,

        /// Print bucket names only
        #[arg(long)]
        names: bool,
    },

    /// Remove a stopped bucket and its container
    Remove {
        bucket: String,
    },

    /// Show the catalogue of core images
    Images,

    /// Assign a core image version to a bucket
    SetImage {
        bucket: String,
        version: String,
    },

    /// Mount a local directory into a bucket
    AddStorage {
        bucket: String,
        local: PathBuf,
        container: PathBuf,

        /// Permissions: r (read-only) or rw
        #[arg(default_value = "r")]
        permission: String,
    },

    /// Unmount a local directory from a bucket
    RemoveStorage {
        bucket: String,
        local: PathBuf,
    },

    /// Publish a port; with no ports given, a free one is picked
    AddPort {
        bucket: String,
        local: Option<u16>,
        container: Option<u16>,

        /// Publish as UDP instead of TCP
        #[arg(long)]
        udp: bool,
    },

    /// Stop publishing a port
    RemovePort {
        bucket: String,
        local: u16,
    },

    /// Start a bucket, creating its container on first start
    Start {
        bucket: String,
    },

    /// Stop a running bucket
    Stop {
        bucket: String,
    },

    /// Refresh and show a bucket's container status
    Status {
        bucket: String,
    },

    /// Run a command inside a running bucket
    Exec {
        bucket: String,
        command: String,

        /// Do not wait for the command to finish
        #[arg(long, short)]
        detach: bool,
    },

    /// Start Jupyter Lab inside a running bucket
    StartJupyter {
        bucket: String,
        local: u16,
        container: u16,
    },

    /// Stop Jupyter Lab inside a bucket
    StopJupyter {
        bucket: String,
    },

    /// Export a bucket to a portable bundle
    Export {
        bucket: String,
        output: PathBuf,

        /// Local storage directory to leave out (repeatable)
        #[arg(long = "exclude", value_name = "LOCAL")]
        exclude: Vec<PathBuf>,
    },

    /// Import a bundle as a new bucket
    Import {
        bucket: String,
        input: PathBuf,

        /// Directory to unpack storage mounts into
        #[arg(long, value_name = "DIR")]
        mounts_dir: Option<PathBuf>,
    },

    /// Start interactive shell mode
    Shell,
}
