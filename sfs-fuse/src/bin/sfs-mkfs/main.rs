mod cli;

use std::fs;
use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;
use std::sync::Mutex;

use clap::Parser;
use cli::Cli;
use log::info;
use sfs::ops;
use sfs::SimpleFileSystem;
use sfs::BLOCK_SIZE;
use sfs_fuse::{BlockFile, SystemClock};

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    println!("image={:?} blocks={} inodes={}", cli.image, cli.blocks, cli.inodes);

    let block_file = Arc::new(BlockFile(Mutex::new({
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&cli.image)?;
        fd.set_len(cli.blocks as u64 * BLOCK_SIZE as u64)?;

        fd
    })));

    let fs = SimpleFileSystem::format(block_file, Arc::new(SystemClock), cli.blocks, cli.inodes)
        .map_err(io::Error::other)?;

    let Some(source) = cli.source else {
        return Ok(());
    };

    for entry in fs::read_dir(&source)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry
            .file_name()
            .into_string()
            .map_err(|name| io::Error::other(format!("non-UTF-8 file name: {name:?}")))?;

        let data = fs::read(entry.path())?;
        let path = format!("/{name}");
        ops::create(&fs, &path, 0o644, 0, 0).map_err(io::Error::other)?;
        let fd = ops::open(&fs, &path, 0).map_err(io::Error::other)?;
        let written = ops::write(&fs, fd, 0, &data).map_err(io::Error::other)?;
        ops::release(&fs, fd).map_err(io::Error::other)?;

        if written < data.len() {
            return Err(io::Error::other(format!(
                "{name}: wrote {written} of {} bytes, file exceeds volume limits",
                data.len()
            )));
        }
        info!("packed: {name} ({written} bytes)");
    }

    Ok(())
}
