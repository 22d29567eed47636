//! # 索引节点层
//!
//! 内存中的 [`Inode`] 句柄：创建、查找、读写、属性、列目录、
//! 删除。命名空间是扁平的——只有根目录这一个目录，
//! 所有文件都挂在它下面。

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use enumflags2::bitflags;
use log::debug;
use spin::Mutex;

use block_dev::BlockDevice;

use crate::block_cache;
use crate::error::{FsError, Result};
use crate::layout::{DirEntry, DiskInode, DiskInodeKind, INODE_DIRECT_COUNT};
use crate::sfs::SimpleFileSystem;
use crate::BLOCK_SIZE;

pub struct Inode {
    inode_id: u32,
    fs: Arc<Mutex<SimpleFileSystem>>,
    block_device: Arc<dyn BlockDevice>,
}

/// 文件属性，供 getattr 一类的请求回填
#[derive(Debug, Default, Clone)]
pub struct Stat {
    pub inode: u64,
    pub mode: u32,
    pub kind: StatKind,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub blocks: u32,
    pub links: u32,
    pub atime: u64,
    pub ctime: u64,
    pub mtime: u64,
}

#[allow(clippy::upper_case_acronyms)]
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatKind {
    DIR = 0o040000,
    #[default]
    FILE = 0o100000,
}

impl Inode {
    #[inline]
    pub(crate) fn new(
        inode_id: u32,
        fs: Arc<Mutex<SimpleFileSystem>>,
        block_device: Arc<dyn BlockDevice>,
    ) -> Self {
        Self {
            inode_id,
            fs,
            block_device,
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.inode_id
    }

    /// 在本目录下创建普通文件，并为其追加目录项
    pub fn create(&self, name: &str, mode: u32, uid: u32, gid: u32) -> Result<Arc<Inode>> {
        let mut fs = self.fs.lock();
        let mut dir = self.load(&fs)?;
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if self.lookup(&fs, &dir, name).is_some() {
            return Err(FsError::AlreadyExists);
        }

        // 名字先行校验，失败时还没有动过任何状态
        DirEntry::new(name, 0)?;

        let inode_id = fs.alloc_inode()?;
        let slot = match self.free_slot(&mut fs, &mut dir) {
            Ok(slot) => slot,
            Err(e) => {
                // 目录没有槽位可用，刚分配的 inode 还回去
                fs.dealloc_inode(inode_id)?;
                return Err(e);
            }
        };

        let now = fs.clock.now();
        let mut disk_inode = DiskInode::default();
        disk_inode.init(
            inode_id,
            DiskInodeKind::File,
            mode,
            uid,
            gid,
            self.inode_id,
            now,
        );
        fs.write_inode(inode_id, &disk_inode)?;

        let entry = DirEntry::new(name, inode_id)?;
        self.write_entry(&fs, slot, &entry);
        // 目录可能刚刚长了一块
        dir.mtime = now;
        self.store(&fs, &dir)?;
        block_cache::sync_all();

        debug!("create: name={name:?} inode={inode_id}");
        Ok(Arc::new(Inode::new(
            inode_id,
            self.fs.clone(),
            self.block_device.clone(),
        )))
    }

    /// 根据文件名获取 inode。
    /// 比较是精确的：区分大小写，不做任何归一化。
    pub fn find(&self, name: &str) -> Result<Arc<Inode>> {
        let fs = self.fs.lock();
        let dir = self.load(&fs)?;
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }

        let inode_id = self.lookup(&fs, &dir, name).ok_or(FsError::NotFound)?;
        Ok(Arc::new(Inode::new(
            inode_id,
            self.fs.clone(),
            self.block_device.clone(),
        )))
    }

    /// 从指定字节偏移读取。
    ///
    /// 逐块游走：块内偏移只在首块非零；不越过已拥有的块，
    /// 文件较短时返回短计数，越界部分不做零填充——
    /// 填充策略留给调用方。
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let fs = self.fs.lock();
        let disk_inode = self.load(&fs)?;

        let mut index = (offset / BLOCK_SIZE as u64) as usize;
        let mut intra = (offset % BLOCK_SIZE as u64) as usize;
        let mut cursor = 0;

        while index < disk_inode.blocks as usize && cursor < buf.len() {
            let take = (buf.len() - cursor).min(BLOCK_SIZE - intra);
            let block_id = fs.data_block_id(disk_inode.direct[index]);
            block_cache::get(block_id as usize, self.block_device.clone())
                .lock()
                .map(|block| buf[cursor..cursor + take].copy_from_slice(&block[intra..intra + take]));
            cursor += take;
            intra = 0;
            index += 1;
        }

        Ok(cursor)
    }

    /// 向指定字节偏移写入。
    ///
    /// 下一个所需块号等于已拥有块数时向分配器要新块；
    /// 空间或直接索引容量耗尽则就地停下，返回已写字节数。
    /// 短写是正常结果，不是错误，已写入的字节不会丢弃。
    pub fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize> {
        let mut fs = self.fs.lock();
        let mut disk_inode = self.load(&fs)?;

        let mut index = (offset / BLOCK_SIZE as u64) as usize;
        let mut intra = (offset % BLOCK_SIZE as u64) as usize;
        let mut cursor = 0;

        while cursor < buf.len() {
            // 写入点落在已拥有块之外的空洞上，本设计不支持
            if index > disk_inode.blocks as usize {
                break;
            }
            if index == disk_inode.blocks as usize {
                if disk_inode.blocks as usize == INODE_DIRECT_COUNT {
                    break;
                }
                let Some(new_block) = fs.alloc_data() else {
                    break;
                };
                disk_inode.push_block(new_block);
            }

            let take = (buf.len() - cursor).min(BLOCK_SIZE - intra);
            let block_id = fs.data_block_id(disk_inode.direct[index]);
            block_cache::get(block_id as usize, self.block_device.clone())
                .lock()
                .map_mut(|block| {
                    block[intra..intra + take].copy_from_slice(&buf[cursor..cursor + take])
                });
            cursor += take;
            intra = 0;
            index += 1;
        }

        if cursor > 0 {
            disk_inode.size = disk_inode.size.max(offset + cursor as u64);
            disk_inode.mtime = fs.clock.now();
            // 新指针必须随槽位落盘，否则重启即丢
            self.store(&fs, &disk_inode)?;
            block_cache::sync_all();
        }

        Ok(cursor)
    }

    pub fn stat(&self) -> Result<Stat> {
        let fs = self.fs.lock();
        let disk_inode = self.load(&fs)?;

        Ok(Stat {
            inode: disk_inode.id as u64,
            mode: disk_inode.mode,
            kind: disk_inode.kind.into(),
            uid: disk_inode.uid,
            gid: disk_inode.gid,
            size: disk_inode.size,
            blocks: disk_inode.blocks,
            links: disk_inode.links,
            atime: disk_inode.atime,
            ctime: disk_inode.ctime,
            mtime: disk_inode.mtime,
        })
    }

    /// 列出目录中全部名字，`.` 与 `..` 也在内
    pub fn ls(&self) -> Result<Vec<String>> {
        let fs = self.fs.lock();
        let dir = self.load(&fs)?;
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }

        let mut names = Vec::new();
        self.scan_entries(&fs, &dir, |_, _, entry| {
            if !entry.is_free() {
                names.push(String::from(entry.name()));
            }
            None::<()>
        });
        Ok(names)
    }

    /// 删除目录项。链接数归零后回收 inode 位、数据块位，
    /// 并返还空闲计数。
    pub fn unlink(&self, name: &str) -> Result<()> {
        if name == "." || name == ".." {
            return Err(FsError::Unsupported);
        }

        let mut fs = self.fs.lock();
        let mut dir = self.load(&fs)?;
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }

        let Some((block, slot, inode_id)) = self.scan_entries(&fs, &dir, |i, slot, entry| {
            (!entry.is_free() && entry.name() == name).then(|| (dir.direct[i], slot, entry.inode_id()))
        }) else {
            return Err(FsError::NotFound);
        };

        let mut target = fs.read_inode(inode_id)?;
        if target.is_dir() {
            return Err(FsError::IsADirectory);
        }

        self.write_entry(&fs, (block, slot), &DirEntry::empty());
        dir.mtime = fs.clock.now();
        self.store(&fs, &dir)?;

        target.links = target.links.saturating_sub(1);
        if target.links == 0 {
            for i in 0..target.blocks as usize {
                fs.dealloc_data(target.direct[i])?;
            }
            fs.dealloc_inode(inode_id)?;
            fs.write_inode(inode_id, &DiskInode::default())?;
        } else {
            fs.write_inode(inode_id, &target)?;
        }
        block_cache::sync_all();

        debug!("unlink: name={name:?} inode={inode_id}");
        Ok(())
    }
}

impl Inode {
    fn load(&self, fs: &SimpleFileSystem) -> Result<DiskInode> {
        fs.read_inode(self.inode_id)
    }

    fn store(&self, fs: &SimpleFileSystem, disk_inode: &DiskInode) -> Result<()> {
        fs.write_inode(self.inode_id, disk_inode)
    }

    /// 线性扫描目录的每个数据块、每块 4 条目录项；
    /// `f` 返回 Some 即短路
    fn scan_entries<V>(
        &self,
        fs: &SimpleFileSystem,
        dir: &DiskInode,
        mut f: impl FnMut(usize, usize, &DirEntry) -> Option<V>,
    ) -> Option<V> {
        for i in 0..dir.blocks as usize {
            let block_id = fs.data_block_id(dir.direct[i]);
            let cache = block_cache::get(block_id as usize, self.block_device.clone());
            let cache = cache.lock();

            let hit = cache.map(|block| {
                for slot in 0..DirEntry::PER_BLOCK {
                    let entry =
                        DirEntry::decode(&block[slot * DirEntry::SIZE..(slot + 1) * DirEntry::SIZE]);
                    if let Some(v) = f(i, slot, &entry) {
                        return Some(v);
                    }
                }
                None
            });
            if hit.is_some() {
                return hit;
            }
        }

        None
    }

    /// 目录内按名精确查找，返回目标的 inode 编号
    fn lookup(&self, fs: &SimpleFileSystem, dir: &DiskInode, name: &str) -> Option<u32> {
        self.scan_entries(fs, dir, |_, _, entry| {
            (!entry.is_free() && entry.name() == name).then_some(entry.inode_id())
        })
    }

    /// 找一个空目录项槽位；没有就为目录增配一个数据块
    fn free_slot(
        &self,
        fs: &mut SimpleFileSystem,
        dir: &mut DiskInode,
    ) -> Result<(u32, usize)> {
        if let Some((i, slot)) =
            self.scan_entries(fs, dir, |i, slot, entry| entry.is_free().then_some((i, slot)))
        {
            return Ok((dir.direct[i], slot));
        }

        if dir.blocks as usize == INODE_DIRECT_COUNT {
            return Err(FsError::NoFreeBlock);
        }
        let index = fs.alloc_data().ok_or(FsError::NoFreeBlock)?;
        // 新目录块清零，四个槽位全部空闲
        block_cache::get(
            fs.data_block_id(index) as usize,
            self.block_device.clone(),
        )
        .lock()
        .map_mut(|block| block.fill(0));
        dir.push_block(index);

        Ok((index, 0))
    }

    /// 覆写一个目录项槽位
    fn write_entry(&self, fs: &SimpleFileSystem, slot: (u32, usize), entry: &DirEntry) {
        let (index, slot) = slot;
        block_cache::get(
            fs.data_block_id(index) as usize,
            self.block_device.clone(),
        )
        .lock()
        .map_mut(|block| {
            entry.encode(&mut block[slot * DirEntry::SIZE..(slot + 1) * DirEntry::SIZE])
        });
    }
}

impl From<DiskInodeKind> for StatKind {
    #[inline]
    fn from(kind: DiskInodeKind) -> Self {
        match kind {
            DiskInodeKind::Directory => Self::DIR,
            DiskInodeKind::File => Self::FILE,
        }
    }
}
