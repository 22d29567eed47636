#[cfg(test)]
mod tests;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use sfs::BlockDevice;
use sfs::Clock;
use sfs::BLOCK_SIZE;

/// 宿主文件充当块设备：镜像文件按块号定位读写。
/// 镜像须事先 `set_len` 到整卷大小，越界块号直接 panic。
#[derive(Debug)]
pub struct BlockFile(pub Mutex<File>);

impl BlockFile {
    fn seek_to(file: &mut File, block_id: usize) {
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .expect("block offset beyond image");
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        let mut file = self.0.lock().unwrap();
        Self::seek_to(&mut file, block_id);
        file.read_exact(buf).expect("image truncated mid-block");
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        let mut file = self.0.lock().unwrap();
        Self::seek_to(&mut file, block_id);
        file.write_all(buf).expect("short write to image");
    }
}

/// 宿主挂钟时间，UNIX 秒
#[derive(Debug)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}
