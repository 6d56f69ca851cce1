use alloc::string::String;

/// 交给调用方的目录项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub ty: DirEntryType,
    /// File size, always 0 for directories
    pub size: u32,
    /// 簇链表的首块
    pub first_block: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DirEntryType {
    Regular = 1,
    Directory = 2,
}

impl DirEntryType {
    pub const fn is_dir(self) -> bool {
        matches!(self, Self::Directory)
    }
}
