use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sampleflow")]
#[command(author, version, about = "Streaming MP4 demuxer feeding a render/encode stage")]
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
    /// Resolve and print the decoder configuration of a file's video track
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Demux a file and write its chunks as JSON lines
    Run {
        /// Input file
        #[arg(required = true)]
        input: PathBuf,

        /// Encoder preset (qvga, vga, hd)
        #[arg(long)]
        preset: Option<String>,

        /// Write the chunk log here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Serve JSON requests from stdin, one per line
    Worker,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
