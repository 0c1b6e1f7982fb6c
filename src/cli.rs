use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish a single package (tar archive or mp4 file)
    Publish {
        /// Dropped package file
        #[arg(short, long)]
        input: PathBuf,

        /// Media platform receiving the upload (local, rest)
        #[arg(short, long, default_value = "local")]
        platform: String,
    },

    /// Publish every package found in a drop directory
    Batch {
        /// Directory containing dropped packages
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Media platform receiving the uploads (local, rest)
        #[arg(short, long, default_value = "local")]
        platform: String,
    },

    /// Resume a failed or interrupted package from its last reached state
    Retry {
        /// Package id
        id: String,
    },

    /// Show package states
    Status {
        /// Package id; all packages when omitted
        id: Option<String>,
    },

    /// Show the renditions available on the media platform
    Info {
        /// Package id
        id: String,

        /// Expected quality (mobile, sd, hd)
        #[arg(short, long, default_value = "hd")]
        quality: String,
    },

    /// Remove a package, its remote media and its public assets
    Remove {
        /// Package id
        id: String,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination file
        #[arg(short, long, default_value = "mediapub.toml")]
        output: PathBuf,
    },
}
