//! # 磁盘块管理器层
//!
//! 构建并维护卷的布局：格式化、挂载、两个编号空间的
//! 分配与回收、inode 槽位的读写。
//!
//! [`SimpleFileSystem`] 即引擎上下文：独占超级块的内存快照
//! 与打开文件句柄表，整体放在一把粗粒度锁后面，调用方
//! 借锁天然串行。同一后备存储上绝不可同时运行两个实例，
//! 因为空闲块计数只在内存中递推、不回读磁盘。

use alloc::sync::Arc;

use log::info;
use spin::Mutex;

use block_dev::BlockDevice;

use crate::block_cache;
use crate::error::{FsError, Result};
use crate::fd::FdTable;
use crate::layout::{Bitmap, DirEntry, DiskInode, DiskInodeKind, SuperBlock};
use crate::vfs::Inode;
use crate::Clock;
use crate::{INODES_PER_BLOCK, INODE_SIZE, ROOT_INODE};

#[derive(Debug)]
pub struct SimpleFileSystem {
    pub(crate) block_device: Arc<dyn BlockDevice>,
    pub(crate) clock: Arc<dyn Clock>,
    /// 超级块的内存快照；`free_data_blocks` 变更后写回 0 号块
    super_block: SuperBlock,
    inode_bitmap: Bitmap,
    data_bitmap: Bitmap,
    pub(crate) fd_table: FdTable,
}

impl SimpleFileSystem {
    /// 格式化一个卷并挂载。
    ///
    /// 布局求解失败（区域为零或超出卷长）是配置错误，
    /// 直接返回 [`FsError::BadGeometry`]。
    pub fn format(
        block_device: Arc<dyn BlockDevice>,
        clock: Arc<dyn Clock>,
        total_blocks: u32,
        max_inodes: u32,
    ) -> Result<Arc<Mutex<Self>>> {
        let super_block = SuperBlock::layout(total_blocks, max_inodes)?;
        info!(
            "format: {total_blocks} blocks, {max_inodes} inodes, data region {}+{}",
            super_block.data_begin, super_block.data_blocks
        );

        // 清空全部元数据块；数据块的内容按需覆盖
        for block_id in 0..super_block.data_begin {
            block_cache::get(block_id as usize, block_device.clone())
                .lock()
                .map_mut(|block| block.fill(0));
        }

        let mut fs = Self {
            inode_bitmap: Bitmap::new(
                super_block.inode_bitmap_begin,
                super_block.inode_bitmap_blocks,
                max_inodes,
            ),
            data_bitmap: Bitmap::new(
                super_block.data_bitmap_begin,
                super_block.data_bitmap_blocks,
                super_block.data_blocks,
            ),
            block_device: block_device.clone(),
            clock,
            super_block,
            fd_table: FdTable::new(),
        };

        // inode 0 保留作句柄表哨兵，根目录固定为 inode 1
        fs.inode_bitmap.mark(&block_device, 0)?;
        fs.inode_bitmap.mark(&block_device, ROOT_INODE)?;
        // 数据区第 0 块保留作占位，第 1 块是根目录的目录块
        fs.data_bitmap.mark(&block_device, 0)?;
        fs.data_bitmap.mark(&block_device, 1)?;
        fs.super_block.free_data_blocks -= 2;

        let now = fs.clock.now();
        let mut root = DiskInode::default();
        root.init(
            ROOT_INODE,
            DiskInodeKind::Directory,
            0o755,
            0,
            0,
            ROOT_INODE,
            now,
        );
        root.push_block(1);
        fs.write_inode(ROOT_INODE, &root)?;
        fs.init_directory_block(1, ROOT_INODE, ROOT_INODE)?;

        fs.persist_super_block();
        block_cache::sync_all();

        Ok(Arc::new(Mutex::new(fs)))
    }

    /// 挂载既有卷：读 0 号块并校验卷签名
    pub fn mount(
        block_device: Arc<dyn BlockDevice>,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Mutex<Self>>> {
        let super_block = block_cache::get(0, block_device.clone())
            .lock()
            .map(|block| SuperBlock::decode(block));
        if !super_block.is_valid() {
            return Err(FsError::Corrupted("bad volume signature"));
        }

        let max_inodes = super_block.inode_blocks * INODES_PER_BLOCK as u32;
        let fs = Self {
            inode_bitmap: Bitmap::new(
                super_block.inode_bitmap_begin,
                super_block.inode_bitmap_blocks,
                max_inodes,
            ),
            data_bitmap: Bitmap::new(
                super_block.data_bitmap_begin,
                super_block.data_bitmap_blocks,
                super_block.data_blocks,
            ),
            block_device,
            clock,
            super_block,
            fd_table: FdTable::new(),
        };
        info!(
            "mount: {} blocks, {} free data blocks",
            fs.super_block.total_blocks, fs.super_block.free_data_blocks
        );

        Ok(Arc::new(Mutex::new(fs)))
    }

    pub fn super_block(&self) -> &SuperBlock {
        &self.super_block
    }

    #[inline]
    pub fn free_data_blocks(&self) -> u32 {
        self.super_block.free_data_blocks
    }

    #[inline]
    pub fn max_inodes(&self) -> u32 {
        self.super_block.inode_blocks * INODES_PER_BLOCK as u32
    }

    pub(crate) fn device(&self) -> Arc<dyn BlockDevice> {
        self.block_device.clone()
    }

    /// 超级块字段变更后写回 0 号块
    pub(crate) fn persist_super_block(&self) {
        let super_block = self.super_block.clone();
        block_cache::get(0, self.block_device.clone())
            .lock()
            .map_mut(|block| super_block.encode(block));
    }

    /// 分配一个 inode 编号；位图扫描耗尽即视为 inode 用尽
    pub(crate) fn alloc_inode(&mut self) -> Result<u32> {
        self.inode_bitmap
            .alloc(&self.block_device)
            .ok_or(FsError::NoFreeInode)
    }

    /// 分配一个数据区相对块号。
    ///
    /// 空闲计数先行检查；成功后由本层扣减并写回超级块，
    /// 位图本身不碰计数。
    pub(crate) fn alloc_data(&mut self) -> Option<u32> {
        if self.super_block.free_data_blocks == 0 {
            return None;
        }

        let index = self.data_bitmap.alloc(&self.block_device)?;
        self.super_block.free_data_blocks -= 1;
        self.persist_super_block();
        Some(index)
    }

    pub(crate) fn dealloc_data(&mut self, index: u32) -> Result<()> {
        self.data_bitmap.clear(&self.block_device, index)?;
        self.super_block.free_data_blocks += 1;
        self.persist_super_block();
        Ok(())
    }

    pub(crate) fn dealloc_inode(&mut self, inode_id: u32) -> Result<()> {
        self.inode_bitmap.clear(&self.block_device, inode_id)
    }

    /// inode 槽位所在的块号与块内字节偏移。
    /// 编号越界说明元数据已不可信。
    pub fn disk_inode_pos(&self, inode_id: u32) -> Result<(u32, usize)> {
        if inode_id >= self.max_inodes() {
            return Err(FsError::Corrupted("inode id out of range"));
        }

        let block_id = self.super_block.inode_begin + inode_id / INODES_PER_BLOCK as u32;
        let offset = inode_id as usize % INODES_PER_BLOCK * INODE_SIZE;
        Ok((block_id, offset))
    }

    pub fn read_inode(&self, inode_id: u32) -> Result<DiskInode> {
        let (block_id, offset) = self.disk_inode_pos(inode_id)?;
        Ok(block_cache::get(block_id as usize, self.block_device.clone())
            .lock()
            .map(|block| DiskInode::decode(&block[offset..offset + INODE_SIZE])))
    }

    /// 读改写整块：槽位写入必须保留同块的另外三条记录
    pub fn write_inode(&self, inode_id: u32, inode: &DiskInode) -> Result<()> {
        let (block_id, offset) = self.disk_inode_pos(inode_id)?;
        block_cache::get(block_id as usize, self.block_device.clone())
            .lock()
            .map_mut(|block| inode.encode(&mut block[offset..offset + INODE_SIZE]));
        Ok(())
    }

    /// 数据区相对块号 → 卷内绝对块号
    #[inline]
    pub fn data_block_id(&self, index: u32) -> u32 {
        self.super_block.data_begin + index
    }

    /// 把一个数据块初始化为目录块：首两项恒为 `.` 与 `..`
    pub(crate) fn init_directory_block(
        &self,
        index: u32,
        self_inode: u32,
        parent_inode: u32,
    ) -> Result<()> {
        let dot = DirEntry::new(".", self_inode)?;
        let dotdot = DirEntry::new("..", parent_inode)?;

        block_cache::get(
            self.data_block_id(index) as usize,
            self.block_device.clone(),
        )
        .lock()
        .map_mut(|block| {
            block.fill(0);
            dot.encode(&mut block[..DirEntry::SIZE]);
            dotdot.encode(&mut block[DirEntry::SIZE..2 * DirEntry::SIZE]);
        });
        Ok(())
    }

    pub fn root_inode(fs: &Arc<Mutex<Self>>) -> Inode {
        let (inode_id, block_device) = {
            let fs_guard = fs.lock();
            (fs_guard.super_block.root_inode, fs_guard.device())
        };
        Inode::new(inode_id, fs.clone(), block_device)
    }
}
