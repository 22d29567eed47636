use crate::error::{FsError, Result};
use crate::BLOCK_SIZE;

use super::{get_u32, put_u32};

/// 名字字段 124 字节，最后一字节留给 \0
pub const NAME_MAX_LEN: usize = 123;

/// 目录项：(inode 编号, 定长名字)，每块恰好 4 条。
/// 名字为空即空闲槽位。
#[derive(Debug, Clone)]
pub struct DirEntry {
    inode_id: u32,
    name: [u8; NAME_MAX_LEN + 1],
}

impl DirEntry {
    /// 目录项大小恒为 128 字节
    pub const SIZE: usize = 128;
    pub const PER_BLOCK: usize = BLOCK_SIZE / Self::SIZE;

    pub fn new(name: &str, inode_id: u32) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > NAME_MAX_LEN {
            return Err(FsError::NameTooLong);
        }

        let mut field = [0; NAME_MAX_LEN + 1];
        field[..bytes.len()].copy_from_slice(bytes);

        Ok(Self {
            inode_id,
            name: field,
        })
    }

    /// 空闲槽位
    pub fn empty() -> Self {
        Self {
            inode_id: 0,
            name: [0; NAME_MAX_LEN + 1],
        }
    }

    pub fn name(&self) -> &str {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(self.name.len());
        core::str::from_utf8(&self.name[..len]).unwrap_or("")
    }

    #[inline]
    pub fn inode_id(&self) -> u32 {
        self.inode_id
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.name[0] == 0
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut name = [0; NAME_MAX_LEN + 1];
        name.copy_from_slice(&buf[4..Self::SIZE]);

        Self {
            inode_id: get_u32(buf, 0),
            name,
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.inode_id);
        buf[4..Self::SIZE].copy_from_slice(&self.name);
    }
}
