#![no_std]

extern crate alloc;

/* sfs 的整体架构，自上而下 */

// 请求接口层：文件请求分发层（如 FUSE 回调）约定的操作面
pub mod ops;

// 索引节点层：扁平单目录命名空间下的文件操作逻辑
mod vfs;
pub use vfs::Inode;
pub use vfs::{Stat, StatKind};

// 打开文件句柄表
mod fd;
pub use fd::{FdTable, MAX_OPEN_FILES};

// 磁盘块管理器层
mod sfs;
pub use sfs::SimpleFileSystem;

// 磁盘数据结构层：表示磁盘文件系统的数据结构
pub mod layout;

// 块缓存层：内存上的磁盘块数据缓存
pub mod block_cache;

// 磁盘块设备接口层：读写磁盘块设备的接口
pub use block_dev::BlockDevice;

mod error;
pub use error::{FsError, Result};

/// 卷签名，居超级块首部
pub const MAGIC: u32 = 0x5346_5331;
pub const BLOCK_SIZE: usize = 512;
pub const BLOCK_BITS: usize = BLOCK_SIZE * 8;
/// inode 记录定长 128 字节，一块恰好放 4 条
pub const INODE_SIZE: usize = 128;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;
/// 根目录固定占用的 inode 编号；0 号保留作句柄表哨兵
pub const ROOT_INODE: u32 = 1;

type DataBlock = [u8; BLOCK_SIZE];

/// 时钟接口：引擎本身不依赖宿主环境，
/// 挂钟时间（UNIX 秒）由上层注入
pub trait Clock: core::fmt::Debug + Send + Sync {
    fn now(&self) -> u64;
}
