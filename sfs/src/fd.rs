//! # 打开文件句柄表
//!
//! 定长槽位数组，`inode_id == 0` 表示空闲。游标从上次
//! 分配的下一格出发环形扫描，句柄号因此趋于均匀复用，
//! 而不是总挤在低位。

use crate::error::{FsError, Result};

/// 全卷同时打开的文件数上限
pub const MAX_OPEN_FILES: usize = 100;

#[derive(Debug, Clone, Copy, Default)]
struct FdEntry {
    /// 0 为空闲哨兵，合法文件的 inode 编号从 1 起
    inode_id: u32,
    pid: u32,
}

#[derive(Debug)]
pub struct FdTable {
    slots: [FdEntry; MAX_OPEN_FILES],
    cursor: usize,
}

impl FdTable {
    pub fn new() -> Self {
        Self {
            slots: [FdEntry::default(); MAX_OPEN_FILES],
            cursor: 0,
        }
    }

    /// 登记一次打开，返回句柄号。
    /// 表满返回 [`FsError::TooManyOpenFiles`]。
    pub fn open(&mut self, inode_id: u32, pid: u32) -> Result<usize> {
        for step in 0..MAX_OPEN_FILES {
            let fd = (self.cursor + step) % MAX_OPEN_FILES;
            if self.slots[fd].inode_id == 0 {
                self.slots[fd] = FdEntry { inode_id, pid };
                self.cursor = (fd + 1) % MAX_OPEN_FILES;
                return Ok(fd);
            }
        }

        Err(FsError::TooManyOpenFiles)
    }

    /// 释放一个句柄；越界或本就空闲的句柄视为非法
    pub fn release(&mut self, fd: usize) -> Result<()> {
        if fd >= MAX_OPEN_FILES || self.slots[fd].inode_id == 0 {
            return Err(FsError::BadHandle);
        }

        self.slots[fd] = FdEntry::default();
        Ok(())
    }

    /// 句柄号换回 inode 编号
    pub fn get(&self, fd: usize) -> Result<u32> {
        if fd >= MAX_OPEN_FILES || self.slots[fd].inode_id == 0 {
            return Err(FsError::BadHandle);
        }

        Ok(self.slots[fd].inode_id)
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}
