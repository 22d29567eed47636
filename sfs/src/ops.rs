//! # 操作分派层
//!
//! 面向宿主请求的薄封装：路径解析成扁平命名空间下的
//! [`Inode`]，句柄号经由打开文件表换算。所有函数以
//! `Arc<Mutex<SimpleFileSystem>>` 为第一参数，请求之间
//! 借锁天然串行。

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use log::{debug, warn};
use spin::Mutex;

use crate::error::{FsError, Result};
use crate::sfs::SimpleFileSystem;
use crate::vfs::{Inode, Stat};

pub type Fs = Arc<Mutex<SimpleFileSystem>>;

/// 解析路径：`/` 即根目录，其余在根下按名查找。
/// 命名空间是扁平的，多级路径不存在；
/// 开头的分隔符有则剥掉一个，没有按裸名字处理。
fn resolve(fs: &Fs, path: &str) -> Result<Arc<Inode>> {
    let name = path.strip_prefix('/').unwrap_or(path);
    let root = SimpleFileSystem::root_inode(fs);
    if name.is_empty() {
        return Ok(Arc::new(root));
    }

    root.find(name)
}

pub fn getattr(fs: &Fs, path: &str) -> Result<Stat> {
    resolve(fs, path)?.stat()
}

/// 在根目录下创建普通文件，返回新文件的 inode 编号
pub fn create(fs: &Fs, path: &str, mode: u32, uid: u32, gid: u32) -> Result<u32> {
    let name = path.strip_prefix('/').unwrap_or(path);
    if name.is_empty() {
        return Err(FsError::InvalidPath);
    }

    let root = SimpleFileSystem::root_inode(fs);
    let inode = root.create(name, mode, uid, gid)?;
    Ok(inode.id())
}

/// 打开文件，在句柄表里登记并返回句柄号
pub fn open(fs: &Fs, path: &str, pid: u32) -> Result<usize> {
    let inode = resolve(fs, path)?;
    let fd = fs.lock().fd_table.open(inode.id(), pid);
    match &fd {
        Ok(fd) => debug!("open: path={path:?} fd={fd}"),
        Err(_) => warn!("open: path={path:?} handle table full"),
    }
    fd
}

/// 关闭句柄
pub fn release(fs: &Fs, fd: usize) -> Result<()> {
    fs.lock().fd_table.release(fd)
}

pub fn read(fs: &Fs, fd: usize, offset: u64, buf: &mut [u8]) -> Result<usize> {
    inode_of(fs, fd)?.read_at(offset, buf)
}

pub fn write(fs: &Fs, fd: usize, offset: u64, buf: &[u8]) -> Result<usize> {
    inode_of(fs, fd)?.write_at(offset, buf)
}

/// 列出目录的全部名字
pub fn readdir(fs: &Fs, path: &str) -> Result<Vec<String>> {
    resolve(fs, path)?.ls()
}

/// 删除根目录下的一个文件
pub fn unlink(fs: &Fs, path: &str) -> Result<()> {
    let name = path.strip_prefix('/').unwrap_or(path);
    if name.is_empty() {
        return Err(FsError::InvalidPath);
    }

    SimpleFileSystem::root_inode(fs).unlink(name)
}

/// 目录层级固定为根目录一层，不支持再建目录
pub fn mkdir(_fs: &Fs, _path: &str, _mode: u32) -> Result<()> {
    Err(FsError::Unsupported)
}

pub fn rmdir(_fs: &Fs, _path: &str) -> Result<()> {
    Err(FsError::Unsupported)
}

fn inode_of(fs: &Fs, fd: usize) -> Result<Inode> {
    let (inode_id, block_device) = {
        let fs_guard = fs.lock();
        (fs_guard.fd_table.get(fd)?, fs_guard.device())
    };
    Ok(Inode::new(inode_id, fs.clone(), block_device))
}
