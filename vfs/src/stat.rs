use crate::DirEntryType;

/// 文件或目录的元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub mode: DirEntryType,
    /// 块大小
    pub block_size: u64,
    /// 链表上的块数
    pub blocks: u64,
    /// File size, 0 for directories
    pub size: u64,
}

impl Stat {
    #[inline]
    pub const fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    /// 链表实际占用的字节数
    #[inline]
    pub const fn allocated(&self) -> u64 {
        self.blocks * self.block_size
    }
}
