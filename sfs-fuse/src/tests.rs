use std::fs::OpenOptions;
use std::io::Write as _;
use std::sync::{Arc, Mutex as StdMutex};

use sfs::layout::Bitmap;
use sfs::ops;
use sfs::{block_cache, BlockDevice, Clock, FsError, SimpleFileSystem, StatKind};
use sfs::{BLOCK_SIZE, MAX_OPEN_FILES, ROOT_INODE};

use crate::{BlockFile, SystemClock};

/// 内存块设备，测试专用
#[derive(Debug)]
struct MemDisk(StdMutex<Vec<u8>>);

impl MemDisk {
    fn new(total_blocks: u32) -> Arc<Self> {
        Arc::new(Self(StdMutex::new(vec![
            0;
            total_blocks as usize * BLOCK_SIZE
        ])))
    }

    fn byte(&self, offset: usize) -> u8 {
        self.0.lock().unwrap()[offset]
    }
}

impl BlockDevice for MemDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        let data = self.0.lock().unwrap();
        let begin = block_id * BLOCK_SIZE;
        buf.copy_from_slice(&data[begin..begin + BLOCK_SIZE]);
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        let mut data = self.0.lock().unwrap();
        let begin = block_id * BLOCK_SIZE;
        data[begin..begin + BLOCK_SIZE].copy_from_slice(buf);
    }
}

#[derive(Debug)]
struct FixedClock(u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

fn fresh(total_blocks: u32, max_inodes: u32) -> ops::Fs {
    let disk = MemDisk::new(total_blocks);
    SimpleFileSystem::format(disk, Arc::new(FixedClock(1_700_000_000)), total_blocks, max_inodes)
        .unwrap()
}

#[test]
fn format_layout_geometry() {
    let fs = fresh(32768, 4096);
    let fs = fs.lock();
    let sb = fs.super_block();

    assert_eq!(sb.inode_bitmap_begin, 1);
    assert_eq!(sb.inode_bitmap_blocks, 1);
    assert_eq!(sb.data_bitmap_begin, 2);
    assert_eq!(sb.data_bitmap_blocks, 8);
    assert_eq!(sb.inode_begin, 10);
    assert_eq!(sb.inode_blocks, 1024);
    assert_eq!(sb.data_begin, 1034);
    assert_eq!(sb.data_blocks, 31734);
    // 数据区第 0 块与根目录块在格式化时即被占用
    assert_eq!(sb.free_data_blocks, 31732);
    assert_eq!(sb.root_inode, ROOT_INODE);
    assert_eq!(sb.total_blocks, 32768);
}

#[test]
fn format_rejects_undersized_volume() {
    let disk = MemDisk::new(16);
    let err = SimpleFileSystem::format(disk, Arc::new(FixedClock(0)), 16, 4096).unwrap_err();
    assert_eq!(err, FsError::BadGeometry);
}

#[test]
fn bitmap_scan_is_bitwise_msb_first() {
    let disk = MemDisk::new(2);
    let device: Arc<dyn BlockDevice> = disk.clone();
    let bitmap = Bitmap::new(1, 1, 64);

    bitmap.mark(&device, 0).unwrap();
    bitmap.mark(&device, 5).unwrap();

    // 首字节非零但仍有空位，扫描必须深入到位一级
    assert_eq!(bitmap.alloc(&device), Some(1));
    assert_eq!(bitmap.alloc(&device), Some(2));
    assert!(bitmap.is_set(&device, 5).unwrap());

    // 耗尽编号空间
    for expect in [3, 4, 6, 7] {
        assert_eq!(bitmap.alloc(&device), Some(expect));
    }
    for expect in 8..64 {
        assert_eq!(bitmap.alloc(&device), Some(expect));
    }
    assert_eq!(bitmap.alloc(&device), None);

    // 位序 MSB-first：编号 0 落在 0x80 位上
    block_cache::sync_all();
    assert_eq!(disk.byte(BLOCK_SIZE), 0b1111_1111);
}

#[test]
fn inode_slot_write_preserves_siblings() {
    let fs = fresh(256, 8);

    ops::create(&fs, "/a", 0o644, 0, 0).unwrap();
    ops::create(&fs, "/b", 0o644, 0, 0).unwrap();
    ops::create(&fs, "/c", 0o644, 0, 0).unwrap();

    // a、b、c 与根目录共享 inode 区的块，写 c 不得抹掉 a、b
    let fs = fs.lock();
    let a = fs.read_inode(2).unwrap();
    let b = fs.read_inode(3).unwrap();
    assert_eq!(a.id, 2);
    assert_eq!(b.id, 3);
    assert_eq!(a.mode, 0o644);

    assert_eq!(
        fs.read_inode(9999).unwrap_err(),
        FsError::Corrupted("inode id out of range")
    );
}

#[test]
fn root_directory_after_format() {
    let fs = fresh(256, 8);

    let stat = ops::getattr(&fs, "/").unwrap();
    assert_eq!(stat.inode, ROOT_INODE as u64);
    assert_eq!(stat.kind, StatKind::DIR);
    assert_eq!(stat.mode, 0o755);
    assert_eq!(stat.size, 0);

    assert_eq!(ops::readdir(&fs, "/").unwrap(), vec![".", ".."]);

    let root = SimpleFileSystem::root_inode(&fs);
    assert_eq!(root.find(".").unwrap().id(), ROOT_INODE);
    assert_eq!(root.find("..").unwrap().id(), ROOT_INODE);
}

#[test]
fn write_then_read_across_block_boundary() {
    let fs = fresh(256, 8);
    ops::create(&fs, "/data", 0o644, 0, 0).unwrap();
    let fd = ops::open(&fs, "/data", 1).unwrap();

    let payload: Vec<u8> = (0..1500u32).map(|i| (i % 251) as u8).collect();
    assert_eq!(ops::write(&fs, fd, 0, &payload).unwrap(), 1500);

    let stat = ops::getattr(&fs, "/data").unwrap();
    assert_eq!(stat.size, 1500);
    // 1500 字节尾部的零头也要一个整块
    assert_eq!(stat.blocks, 3);

    let mut buf = vec![0; 1500];
    assert_eq!(ops::read(&fs, fd, 0, &mut buf).unwrap(), 1500);
    assert_eq!(buf, payload);

    // 中段偏移读取
    let mut buf = vec![0; 600];
    assert_eq!(ops::read(&fs, fd, 400, &mut buf).unwrap(), 600);
    assert_eq!(buf, payload[400..1000]);

    ops::release(&fs, fd).unwrap();
}

#[test]
fn write_stops_at_direct_pointer_capacity() {
    let fs = fresh(256, 8);
    ops::create(&fs, "/big", 0o644, 0, 0).unwrap();
    let fd = ops::open(&fs, "/big", 1).unwrap();

    // 12 个直接索引共 6144 字节，多出的 1 字节写不进去
    let payload = vec![0xab; 12 * BLOCK_SIZE + 1];
    assert_eq!(ops::write(&fs, fd, 0, &payload).unwrap(), 12 * BLOCK_SIZE);

    let stat = ops::getattr(&fs, "/big").unwrap();
    assert_eq!(stat.size, (12 * BLOCK_SIZE) as u64);
    assert_eq!(stat.blocks, 12);
}

#[test]
fn overwrite_within_allocated_range() {
    let fs = fresh(256, 8);
    ops::create(&fs, "/note", 0o644, 0, 0).unwrap();
    let fd = ops::open(&fs, "/note", 1).unwrap();

    ops::write(&fs, fd, 0, b"hello world").unwrap();
    assert_eq!(ops::write(&fs, fd, 6, b"rust!").unwrap(), 5);

    let mut buf = vec![0; 11];
    ops::read(&fs, fd, 0, &mut buf).unwrap();
    assert_eq!(&buf, b"hello rust!");
    // 覆盖写不改变文件长度
    assert_eq!(ops::getattr(&fs, "/note").unwrap().size, 11);
}

#[test]
fn write_into_hole_is_rejected_with_zero_count() {
    let fs = fresh(256, 8);
    ops::create(&fs, "/sparse", 0o644, 0, 0).unwrap();
    let fd = ops::open(&fs, "/sparse", 1).unwrap();

    // 偏移落在未分配块之后，一个字节也写不了
    assert_eq!(ops::write(&fs, fd, 2 * BLOCK_SIZE as u64, b"x").unwrap(), 0);
    assert_eq!(ops::getattr(&fs, "/sparse").unwrap().size, 0);
}

#[test]
fn handle_table_wraps_and_exhausts() {
    let fs = fresh(256, 8);
    ops::create(&fs, "/f", 0o644, 0, 0).unwrap();

    for expect in 0..MAX_OPEN_FILES {
        assert_eq!(ops::open(&fs, "/f", 1).unwrap(), expect);
    }
    assert_eq!(
        ops::open(&fs, "/f", 1).unwrap_err(),
        FsError::TooManyOpenFiles
    );

    // 释放中间一格后，环形扫描应复用它
    ops::release(&fs, 50).unwrap();
    assert_eq!(ops::open(&fs, "/f", 1).unwrap(), 50);

    ops::release(&fs, 50).unwrap();
    assert_eq!(ops::release(&fs, 50).unwrap_err(), FsError::BadHandle);
    assert_eq!(ops::read(&fs, 50, 0, &mut [0; 4]).unwrap_err(), FsError::BadHandle);
}

#[test]
fn lookup_and_create_errors() {
    let fs = fresh(256, 8);

    assert_eq!(
        ops::getattr(&fs, "/missing").unwrap_err(),
        FsError::NotFound
    );
    ops::create(&fs, "/taken", 0o644, 0, 0).unwrap();
    assert_eq!(
        ops::create(&fs, "/taken", 0o644, 0, 0).unwrap_err(),
        FsError::AlreadyExists
    );
    assert_eq!(ops::create(&fs, "/", 0o644, 0, 0).unwrap_err(), FsError::InvalidPath);

    let long = format!("/{}", "n".repeat(124));
    assert_eq!(
        ops::create(&fs, &long, 0o644, 0, 0).unwrap_err(),
        FsError::NameTooLong
    );

    // 名字比较区分大小写
    assert_eq!(ops::getattr(&fs, "/TAKEN").unwrap_err(), FsError::NotFound);
}

#[test]
fn bare_names_resolve_like_rooted_paths() {
    let fs = fresh(256, 8);

    // 开头的分隔符可有可无，两种写法指向同一个文件
    assert_eq!(ops::create(&fs, "bare", 0o644, 0, 0).unwrap(), 2);
    assert_eq!(ops::getattr(&fs, "bare").unwrap().inode, 2);
    assert_eq!(ops::getattr(&fs, "/bare").unwrap().inode, 2);

    let fd = ops::open(&fs, "bare", 1).unwrap();
    ops::write(&fs, fd, 0, b"same file").unwrap();
    ops::release(&fs, fd).unwrap();
    assert_eq!(ops::getattr(&fs, "/bare").unwrap().size, 9);

    ops::unlink(&fs, "bare").unwrap();
    assert_eq!(ops::getattr(&fs, "/bare").unwrap_err(), FsError::NotFound);
}

#[test]
fn unlink_reclaims_blocks_and_inode() {
    let fs = fresh(256, 8);
    ops::create(&fs, "/victim", 0o644, 0, 0).unwrap();
    let fd = ops::open(&fs, "/victim", 1).unwrap();
    ops::write(&fs, fd, 0, &vec![7; 2 * BLOCK_SIZE]).unwrap();
    ops::release(&fs, fd).unwrap();

    let free_before = fs.lock().free_data_blocks();
    ops::unlink(&fs, "/victim").unwrap();
    assert_eq!(fs.lock().free_data_blocks(), free_before + 2);
    assert_eq!(ops::getattr(&fs, "/victim").unwrap_err(), FsError::NotFound);

    // 位图升序扫描，回收的 inode 编号随即复用
    assert_eq!(ops::create(&fs, "/heir", 0o644, 0, 0).unwrap(), 2);

    assert_eq!(ops::unlink(&fs, "/.").unwrap_err(), FsError::Unsupported);
    assert_eq!(ops::unlink(&fs, "/gone").unwrap_err(), FsError::NotFound);
}

#[test]
fn directories_cannot_be_nested() {
    let fs = fresh(256, 8);
    assert_eq!(ops::mkdir(&fs, "/sub", 0o755).unwrap_err(), FsError::Unsupported);
    assert_eq!(ops::rmdir(&fs, "/sub").unwrap_err(), FsError::Unsupported);
}

#[test]
fn inode_space_exhaustion() {
    let fs = fresh(256, 8);

    // 8 个 inode 里 0 号与根目录已占两个
    for i in 0..6 {
        ops::create(&fs, &format!("/f{i}"), 0o644, 0, 0).unwrap();
    }
    assert_eq!(
        ops::create(&fs, "/straw", 0o644, 0, 0).unwrap_err(),
        FsError::NoFreeInode
    );
}

#[test]
fn volume_persists_across_remount() {
    let dir = tempfile::TempDir::new().unwrap();
    let image = dir.path().join("fs.img");

    let open_device = || {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&image)
            .unwrap();
        file.set_len(128 * BLOCK_SIZE as u64).unwrap();
        Arc::new(BlockFile(StdMutex::new(file)))
    };

    {
        let fs =
            SimpleFileSystem::format(open_device(), Arc::new(SystemClock), 128, 8).unwrap();
        ops::create(&fs, "/persist", 0o600, 42, 42).unwrap();
        let fd = ops::open(&fs, "/persist", 1).unwrap();
        ops::write(&fs, fd, 0, b"survives remount").unwrap();
        ops::release(&fs, fd).unwrap();
    }

    let fs = SimpleFileSystem::mount(open_device(), Arc::new(SystemClock)).unwrap();
    let stat = ops::getattr(&fs, "/persist").unwrap();
    assert_eq!(stat.uid, 42);
    assert_eq!(stat.size, 16);

    let fd = ops::open(&fs, "/persist", 2).unwrap();
    let mut buf = vec![0; 16];
    ops::read(&fs, fd, 0, &mut buf).unwrap();
    assert_eq!(&buf, b"survives remount");
}

#[test]
fn mount_rejects_foreign_volume() {
    let dir = tempfile::TempDir::new().unwrap();
    let image = dir.path().join("junk.img");

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&image)
        .unwrap();
    file.write_all(&vec![0xee; 4 * BLOCK_SIZE]).unwrap();

    let device = Arc::new(BlockFile(StdMutex::new(file)));
    assert_eq!(
        SimpleFileSystem::mount(device, Arc::new(SystemClock)).unwrap_err(),
        FsError::Corrupted("bad volume signature")
    );
}
