use crate::error::{FsError, Result};
use crate::{BLOCK_BITS, INODES_PER_BLOCK, MAGIC, ROOT_INODE};

use super::{get_u32, put_u32};

/// 超级块（0 号块）：
/// - 提供文件系统合法性校验；
/// - 一次性定下各连续区域的位置与大小。
///
/// 所有 begin/blocks 字段只在 [`SuperBlock::layout`] 中推导，
/// 此后任何地方不得重算。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    /// 魔数：用于校验文件系统合法性
    magic: u32,
    /// 文件系统占据块数
    pub total_blocks: u32,
    pub inode_bitmap_begin: u32,
    pub inode_bitmap_blocks: u32,
    pub data_bitmap_begin: u32,
    pub data_bitmap_blocks: u32,
    pub inode_begin: u32,
    pub inode_blocks: u32,
    pub data_begin: u32,
    pub data_blocks: u32,
    /// 数据区空闲块计数，每次分配/回收后须写回 0 号块
    pub free_data_blocks: u32,
    pub root_inode: u32,
}

impl SuperBlock {
    /// 编码后的字节长度
    pub const SIZE: usize = 48;

    /// 求解磁盘布局。
    ///
    /// 索引节点位图与索引节点区域由 `max_inodes` 直接定出；
    /// 余下的块在数据块位图与数据区之间一次分净。
    /// 任一区域为零或布局超出卷长即为配置错误。
    pub fn layout(total_blocks: u32, max_inodes: u32) -> Result<Self> {
        let block_bits = BLOCK_BITS as u32;

        let inode_bitmap_begin = 1;
        let inode_bitmap_blocks = max_inodes.div_ceil(block_bits);
        let inode_blocks = max_inodes.div_ceil(INODES_PER_BLOCK as u32);

        let meta_blocks = 1 + inode_bitmap_blocks + inode_blocks;
        if max_inodes == 0 || total_blocks <= meta_blocks {
            return Err(FsError::BadGeometry);
        }

        let rest = total_blocks - meta_blocks;
        let data_bitmap_blocks = (rest + block_bits) / (block_bits + 1);
        let data_blocks = rest - data_bitmap_blocks;
        if data_bitmap_blocks == 0 || data_blocks == 0 {
            return Err(FsError::BadGeometry);
        }

        let data_bitmap_begin = inode_bitmap_begin + inode_bitmap_blocks;
        let inode_begin = data_bitmap_begin + data_bitmap_blocks;
        let data_begin = inode_begin + inode_blocks;
        debug_assert_eq!(data_begin + data_blocks, total_blocks);

        Ok(Self {
            magic: MAGIC,
            total_blocks,
            inode_bitmap_begin,
            inode_bitmap_blocks,
            data_bitmap_begin,
            data_bitmap_blocks,
            inode_begin,
            inode_blocks,
            data_begin,
            data_blocks,
            free_data_blocks: data_blocks,
            root_inode: ROOT_INODE,
        })
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    pub fn decode(buf: &[u8]) -> Self {
        Self {
            magic: get_u32(buf, 0),
            total_blocks: get_u32(buf, 4),
            inode_bitmap_begin: get_u32(buf, 8),
            inode_bitmap_blocks: get_u32(buf, 12),
            data_bitmap_begin: get_u32(buf, 16),
            data_bitmap_blocks: get_u32(buf, 20),
            inode_begin: get_u32(buf, 24),
            inode_blocks: get_u32(buf, 28),
            data_begin: get_u32(buf, 32),
            data_blocks: get_u32(buf, 36),
            free_data_blocks: get_u32(buf, 40),
            root_inode: get_u32(buf, 44),
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.magic);
        put_u32(buf, 4, self.total_blocks);
        put_u32(buf, 8, self.inode_bitmap_begin);
        put_u32(buf, 12, self.inode_bitmap_blocks);
        put_u32(buf, 16, self.data_bitmap_begin);
        put_u32(buf, 20, self.data_bitmap_blocks);
        put_u32(buf, 24, self.inode_begin);
        put_u32(buf, 28, self.inode_blocks);
        put_u32(buf, 32, self.data_begin);
        put_u32(buf, 36, self.data_blocks);
        put_u32(buf, 40, self.free_data_blocks);
        put_u32(buf, 44, self.root_inode);
    }
}
