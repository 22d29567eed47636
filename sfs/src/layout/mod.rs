//! # 磁盘数据结构层
//!
//! sfs 的磁盘布局（区域连续、互不重叠、次序固定）：
//! 超级块 | 索引节点位图 | 数据块位图 | 索引节点区域 | 数据块区域
//!
//! 所有磁盘记录都经显式编解码落盘：逐字段定偏移、小端序，
//! 不依赖内存结构体的布局。

mod super_block;
pub use super_block::SuperBlock;

mod bitmap;
pub use bitmap::Bitmap;

mod inode;
pub use inode::{DiskInode, DiskInodeKind, INODE_DIRECT_COUNT};

/// 目录项，也属于磁盘文件系统数据结构
mod dir_entry;
pub use dir_entry::{DirEntry, NAME_MAX_LEN};

#[inline]
pub(crate) fn get_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

#[inline]
pub(crate) fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn get_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

#[inline]
pub(crate) fn put_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}
