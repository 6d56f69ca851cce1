use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about = "A FAT filesystem living in a single image file")]
pub struct Cli {
    /// Image file backing the filesystem
    #[arg(long, short, default_value = "filesystem.dat")]
    pub image: PathBuf,

    /// Bytes per block, a multiple of 32
    #[arg(long, short, default_value_t = 1024)]
    pub block_size: usize,

    /// Number of blocks in the image
    #[arg(long, short = 'n', default_value_t = 2048)]
    pub blocks: usize,

    #[command(subcommand)]
    pub command: Command,
}

/// 交互模式下的一行命令
#[derive(Parser)]
#[command(no_binary_name = true)]
pub struct Line {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Format the image, discarding everything on it
    Init,
    /// Re-read the allocation table from the image
    Load,
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Create a directory
    Mkdir { path: String },
    /// Create an empty file
    Create { path: String },
    /// Remove a file or an empty directory
    Unlink {
        path: String,
        /// Remove a directory together with everything under it
        #[arg(long, short)]
        recursive: bool,
    },
    /// Replace a file's content with DATA repeated REP times
    Write { data: String, rep: usize, path: String },
    /// Append DATA repeated REP times to a file
    Append { data: String, rep: usize, path: String },
    /// Print a file's content
    Read { path: String },
    /// Show the size and block usage of a file or directory
    Stat { path: String },
    /// Dump the allocation table to a text file
    Export { file: PathBuf },
    /// Verify the allocation table against the directory tree
    Check,
    /// Show volume geometry and usage
    Info,
    /// Read commands from standard input until `exit`
    Shell,
}
