use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
pub struct Cli {
    /// Image file to create
    pub image: PathBuf,

    /// Volume size in 512-byte blocks
    #[arg(long, default_value_t = 32768)]
    pub blocks: u32,

    /// Inode table capacity
    #[arg(long, default_value_t = 4096)]
    pub inodes: u32,

    /// Directory whose regular files are packed into the root
    #[arg(long, short)]
    pub source: Option<PathBuf>,
}
