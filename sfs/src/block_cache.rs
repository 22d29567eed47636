//! # 块缓存层
//!
//! 块设备读写一般慢于内存读写，所有对块的操作先落到
//! 内存缓冲区，脏块在同步时写回。缓存管理器全局唯一，
//! 以（设备标识，块号）为键，同一进程可以同时持有多个卷。
//!
//! 缓存对使用者透明：拿到 [`BlockCache`] 后，块内容
//! **一定已在缓冲区中**。

use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use block_dev::BlockDevice;

use crate::DataBlock;
use crate::BLOCK_SIZE;

static BLOCK_CACHE_MANAGER: Mutex<BlockCacheManager> = Mutex::new(BlockCacheManager::new());

/// 同一设备的不同 `Arc` 视为不同卷；条目在队列中即持有设备，
/// 指针在此期间不会被复用
fn device_key(block_device: &Arc<dyn BlockDevice>) -> usize {
    Arc::as_ptr(block_device).cast::<u8>() as usize
}

/// 块缓存全局管理：缓存、调度块缓存
struct BlockCacheManager {
    queue: Vec<((usize, usize), Arc<Mutex<BlockCache>>)>,
}

#[inline]
pub fn get(block_id: usize, block_device: Arc<dyn BlockDevice>) -> Arc<Mutex<BlockCache>> {
    BLOCK_CACHE_MANAGER.lock().get(block_id, block_device)
}

/// 把所有脏块写回各自的设备
pub fn sync_all() {
    BLOCK_CACHE_MANAGER
        .lock()
        .queue
        .iter()
        .for_each(|(_, cache)| cache.lock().sync());
}

/// 内存中的块缓存
pub struct BlockCache {
    /// 缓存的数据
    data: DataBlock,
    /// 对应的块号
    block_id: usize,
    /// 底层块设备的引用
    block_device: Arc<dyn BlockDevice>,
    /// 是否为脏块
    modified: bool,
}

impl BlockCache {
    fn new(block_id: usize, block_device: Arc<dyn BlockDevice>) -> Self {
        let mut data = [0; BLOCK_SIZE];
        block_device.read_block(block_id, &mut data);

        Self {
            data,
            block_id,
            block_device,
            modified: false,
        }
    }

    pub fn sync(&mut self) {
        if self.modified {
            self.modified = false;
            self.block_device.write_block(self.block_id, &self.data);
        }
    }

    /// 只读访问整块字节
    #[inline]
    pub fn map<V>(&self, f: impl FnOnce(&DataBlock) -> V) -> V {
        f(&self.data)
    }

    /// 读改写访问整块字节，块随即记为脏
    #[inline]
    pub fn map_mut<V>(&mut self, f: impl FnOnce(&mut DataBlock) -> V) -> V {
        self.modified = true;
        f(&mut self.data)
    }
}

impl Drop for BlockCache {
    fn drop(&mut self) {
        self.sync();
    }
}

impl BlockCacheManager {
    /// 块缓存个数的上限
    const CAPACITY: usize = 64;

    const fn new() -> Self {
        Self { queue: Vec::new() }
    }

    // 块缓存调度策略：踢走闲置块
    fn get(
        &mut self,
        block_id: usize,
        block_device: Arc<dyn BlockDevice>,
    ) -> Arc<Mutex<BlockCache>> {
        let key = (device_key(&block_device), block_id);

        // 尝试从缓冲区中读取块
        if let Some(cache) = self
            .queue
            .iter()
            .find_map(|(k, cache)| (key == *k).then_some(cache))
        {
            return Arc::clone(cache);
        };

        // 触及上限，写回一个没有其它引用的块；
        // 全部在用时允许队列临时超额
        if self.queue.len() >= Self::CAPACITY {
            if let Some(index) = self
                .queue
                .iter()
                .position(|(_, cache)| Arc::strong_count(cache) == 1)
            {
                self.queue.remove(index);
            }
        }

        // 缓存新块
        let block_cache = Arc::new(Mutex::new(BlockCache::new(block_id, block_device)));
        self.queue.push((key, block_cache.clone()));

        block_cache
    }
}
