use alloc::sync::Arc;

use block_dev::BlockDevice;

use crate::block_cache;
use crate::error::{FsError, Result};
use crate::{BLOCK_BITS, BLOCK_SIZE};

/// 位图区域，按位记录一段编号空间的分配情况。
///
/// 位序为 MSB-first：编号 `i` 落在第 `i / 8` 字节的
/// `0x80 >> (i % 8)` 位上；字节再按 `BLOCK_SIZE` 分块，
/// 块号相对区域起点。
#[derive(Debug, Clone, Copy)]
pub struct Bitmap {
    /// 位图区域起始块（卷内绝对块号）
    begin: u32,
    /// 位图区域占用块数
    blocks: u32,
    /// 编号空间的有效位数；末块尾部的填充位永不参与分配
    bits: u32,
}

impl Bitmap {
    #[inline]
    pub fn new(begin: u32, blocks: u32, bits: u32) -> Self {
        Self {
            begin,
            blocks,
            bits,
        }
    }

    /// 编号所在的位图块、块内字节偏移与位掩码。
    /// 落在区域之外说明上层给了非法编号。
    fn locate(&self, index: u32) -> Result<(usize, usize, u8)> {
        let byte = index / 8;
        let block_offset = byte / BLOCK_SIZE as u32;
        if index >= self.bits || block_offset >= self.blocks {
            return Err(FsError::Corrupted("bitmap index out of range"));
        }

        Ok((
            (self.begin + block_offset) as usize,
            (byte % BLOCK_SIZE as u32) as usize,
            0x80 >> (index % 8),
        ))
    }

    /// 置位一个编号
    pub fn mark(&self, block_device: &Arc<dyn BlockDevice>, index: u32) -> Result<()> {
        let (block_id, byte, mask) = self.locate(index)?;
        block_cache::get(block_id, block_device.clone())
            .lock()
            .map_mut(|block| block[byte] |= mask);
        Ok(())
    }

    /// 清掉一个编号，供回收路径使用
    pub fn clear(&self, block_device: &Arc<dyn BlockDevice>, index: u32) -> Result<()> {
        let (block_id, byte, mask) = self.locate(index)?;
        block_cache::get(block_id, block_device.clone())
            .lock()
            .map_mut(|block| block[byte] &= !mask);
        Ok(())
    }

    pub fn is_set(&self, block_device: &Arc<dyn BlockDevice>, index: u32) -> Result<bool> {
        let (block_id, byte, mask) = self.locate(index)?;
        Ok(block_cache::get(block_id, block_device.clone())
            .lock()
            .map(|block| block[byte] & mask != 0))
    }

    /// 升序扫描首个 0 位并置位，返回其全局编号；
    /// 空间耗尽则返回空。
    pub fn alloc(&self, block_device: &Arc<dyn BlockDevice>) -> Option<u32> {
        for block_index in 0..self.blocks {
            let cache = block_cache::get((self.begin + block_index) as usize, block_device.clone());
            let mut cache = cache.lock();

            let Some((byte_index, bit)) = cache.map(|block| {
                block
                    .iter()
                    .enumerate()
                    .find_map(|(byte_index, &byte)| {
                        (byte != 0xff).then_some((byte_index, byte.leading_ones()))
                    })
            }) else {
                continue;
            };

            let index = block_index * BLOCK_BITS as u32 + byte_index as u32 * 8 + bit;
            // 首个 0 位已越过有效位数，说明空间里不再有空位
            if index >= self.bits {
                return None;
            }

            cache.map_mut(|block| block[byte_index] |= 0x80 >> bit);
            return Some(index);
        }

        None
    }
}
