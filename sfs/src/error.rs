use core::fmt;

/// 文件系统错误类型。
///
/// 资源耗尽与查找失败都是可恢复错误，原样返回给调用方；
/// [`FsError::Corrupted`] 表示元数据不变量被破坏，
/// 调用应当就此停止，但引擎不会中止宿主进程。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// 布局参数无法构成合法的卷（配置错误，格式化即失败）
    BadGeometry,
    /// inode 位图耗尽
    NoFreeInode,
    /// 数据区耗尽
    NoFreeBlock,
    NotFound,
    AlreadyExists,
    NameTooLong,
    InvalidPath,
    /// 打开文件句柄表已满
    TooManyOpenFiles,
    /// 句柄越界或指向空槽
    BadHandle,
    NotADirectory,
    IsADirectory,
    /// 操作在约定中声明但不受支持（如分层目录）
    Unsupported,
    Corrupted(&'static str),
}

/// 文件系统统一结果类型
pub type Result<T> = core::result::Result<T, FsError>;

impl core::error::Error for FsError {}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadGeometry => write!(f, "volume geometry does not fit the block count"),
            Self::NoFreeInode => write!(f, "no free inode available"),
            Self::NoFreeBlock => write!(f, "no free data block available"),
            Self::NotFound => write!(f, "file or directory not found"),
            Self::AlreadyExists => write!(f, "file already exists"),
            Self::NameTooLong => write!(f, "file name too long"),
            Self::InvalidPath => write!(f, "invalid path"),
            Self::TooManyOpenFiles => write!(f, "too many open files"),
            Self::BadHandle => write!(f, "bad file handle"),
            Self::NotADirectory => write!(f, "expected a directory, found a file"),
            Self::IsADirectory => write!(f, "expected a file, found a directory"),
            Self::Unsupported => write!(f, "operation not supported"),
            Self::Corrupted(what) => write!(f, "file system corrupted: {what}"),
        }
    }
}
