use crate::INODE_SIZE;

use super::{get_u32, get_u64, put_u32, put_u64};

/// 一个文件最多拥有的数据块数（仅直接索引）
pub const INODE_DIRECT_COUNT: usize = 12;

/// 磁盘上的 inode 记录，定长 [`INODE_SIZE`] 字节。
///
/// 编码偏移（小端）：
/// `0` id | `4` mode | `8` uid | `12` gid | `16` size |
/// `24` atime | `32` ctime | `40` mtime | `48` kind |
/// `52` blocks | `56` links | `60` parent | `64` direct×12 |
/// `112..128` 保留。
///
/// 追加字段前须确认编码不越过记录长度，
/// 否则每块 4 条记录的换算全部失效。
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiskInode {
    pub id: u32,
    /// 权限位，按 Unix 习惯解释
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    /// 文件字节长度
    pub size: u64,
    pub atime: u64,
    pub ctime: u64,
    pub mtime: u64,
    pub kind: DiskInodeKind,
    /// 已拥有的数据块数，恒等于 `direct` 中有效项的个数
    pub blocks: u32,
    /// 硬链接个数
    pub links: u32,
    /// 上级目录的 inode 编号
    pub parent: u32,
    /// 直接索引：数据区相对块号，前 `blocks` 项有效
    pub direct: [u32; INODE_DIRECT_COUNT],
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DiskInodeKind {
    Directory = 0,
    #[default]
    File = 1,
}

impl DiskInode {
    pub fn init(
        &mut self,
        id: u32,
        kind: DiskInodeKind,
        mode: u32,
        uid: u32,
        gid: u32,
        parent: u32,
        now: u64,
    ) {
        *self = Self {
            id,
            mode,
            uid,
            gid,
            kind,
            links: 1,
            parent,
            atime: now,
            ctime: now,
            mtime: now,
            ..Default::default()
        };
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == DiskInodeKind::Directory
    }

    /// 追加一个数据块的直接索引；容量由调用方把关
    #[inline]
    pub fn push_block(&mut self, index: u32) {
        self.direct[self.blocks as usize] = index;
        self.blocks += 1;
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut direct = [0; INODE_DIRECT_COUNT];
        for (i, ptr) in direct.iter_mut().enumerate() {
            *ptr = get_u32(buf, 64 + i * 4);
        }

        Self {
            id: get_u32(buf, 0),
            mode: get_u32(buf, 4),
            uid: get_u32(buf, 8),
            gid: get_u32(buf, 12),
            size: get_u64(buf, 16),
            atime: get_u64(buf, 24),
            ctime: get_u64(buf, 32),
            mtime: get_u64(buf, 40),
            kind: match get_u32(buf, 48) {
                0 => DiskInodeKind::Directory,
                _ => DiskInodeKind::File,
            },
            blocks: get_u32(buf, 52),
            links: get_u32(buf, 56),
            parent: get_u32(buf, 60),
            direct,
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.id);
        put_u32(buf, 4, self.mode);
        put_u32(buf, 8, self.uid);
        put_u32(buf, 12, self.gid);
        put_u64(buf, 16, self.size);
        put_u64(buf, 24, self.atime);
        put_u64(buf, 32, self.ctime);
        put_u64(buf, 40, self.mtime);
        put_u32(buf, 48, self.kind as u32);
        put_u32(buf, 52, self.blocks);
        put_u32(buf, 56, self.links);
        put_u32(buf, 60, self.parent);
        for (i, &ptr) in self.direct.iter().enumerate() {
            put_u32(buf, 64 + i * 4, ptr);
        }
        buf[112..INODE_SIZE].fill(0);
    }
}
