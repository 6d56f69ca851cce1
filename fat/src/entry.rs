use crate::BlockId;

/// FAT中的一条记录，描述对应块的角色。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FatEntry(u16);

#[derive(Debug, PartialEq, Eq)]
pub enum EntryError {
    Free,
    Reserved,
    Eof,
}

impl From<BlockId> for FatEntry {
    fn from(id: BlockId) -> Self {
        // NOTE: 几何参数保证块编号不超过15位
        Self(id.raw() as u16)
    }
}

impl FatEntry {
    pub const FREE: Self = Self(0x0000);

    /// FAT区自身占用的块
    pub const RESERVED: Self = Self(0x7ffe);

    /// 链表上的最后一块，根目录也用它
    pub const EOF: Self = Self(0x7fff);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn is_free(self) -> bool {
        self.0 == Self::FREE.0
    }

    /// 解出下一块的编号。
    /// 超出`0x7fff`的值同样视为保留。
    pub fn validate(self) -> Result<BlockId, EntryError> {
        match self {
            FatEntry::FREE => Err(EntryError::Free),
            FatEntry::EOF => Err(EntryError::Eof),
            entry if entry >= FatEntry::RESERVED => Err(EntryError::Reserved),
            FatEntry(next) => Ok(BlockId::new(next as usize)),
        }
    }

    pub const fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    pub const fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }
}
