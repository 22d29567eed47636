//! # 块设备接口层
//!
//! 块设备以**块**为单位存取数据，块号在整个卷内绝对编址；
//! [`BlockDevice`] 是对这种设备的最小抽象，
//! 单块粒度的读写视为原子完成。
//!
//! 存储引擎只通过此特质访问底层介质，
//! 真实设备（或宿主文件模拟）由上层提供实现。

#![no_std]

use core::any::Any;
use core::fmt::Debug;

/// 块设备驱动特质
pub trait BlockDevice: Debug + Send + Sync + Any {
    /// 读出整块，`buf` 长度须恰为块大小
    fn read_block(&self, block_id: usize, buf: &mut [u8]);

    /// 写入整块，`buf` 长度须恰为块大小
    fn write_block(&self, block_id: usize, buf: &[u8]);
}
