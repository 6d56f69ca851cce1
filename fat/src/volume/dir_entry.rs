//! 目录块，存放目录项的区域。
//!
//! 一个目录块就是一组定长的槽位，全0的槽位是空闲的。

use alloc::string::String;

use vfs::DirEntryType;

use crate::BlockId;

/// 目录项大小恒为32字节
pub const DIR_ENTRY_SIZE: usize = 32;

/// 文件名的最大字节数，最后一字节留给 \0
pub const NAME_MAX: usize = 24;

const NAME_CAP: usize = NAME_MAX + 1;

const ATTR_OFFSET: usize = 25;
const FIRST_BLOCK_OFFSET: usize = 26;
const SIZE_OFFSET: usize = 28;

const ATTR_FREE: u8 = 0x00;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirEntryStatus {
    Free,
    Occupied,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    /// NULL结尾字符串
    name: [u8; NAME_CAP],

    /// - 0x00: free slot
    /// - 0x01: file
    /// - 0x02: directory
    attr: u8,

    /// First block of the chain
    /// for file/directory described by this entry
    first_block: u16,

    /// Quantity containing size in bytes
    /// of file described by this entry
    file_size: u32,
}

impl DirEntry {
    pub const FREE: Self = Self {
        name: [0; NAME_CAP],
        attr: ATTR_FREE,
        first_block: 0,
        file_size: 0,
    };

    /// 文件名过长或含有`\0`、`/`时报错。
    pub fn new(name: &str, ty: DirEntryType, first_block: BlockId) -> vfs::Result<Self> {
        check_name(name)?;

        let mut dirent = Self {
            attr: ty as u8,
            ..Self::FREE
        };
        dirent.name[..name.len()].copy_from_slice(name.as_bytes());
        dirent.set_first_block(first_block);
        Ok(dirent)
    }

    pub fn decode(bytes: &[u8]) -> Self {
        debug_assert_eq!(DIR_ENTRY_SIZE, bytes.len());

        let mut name = [0; NAME_CAP];
        name.copy_from_slice(&bytes[..NAME_CAP]);
        Self {
            name,
            attr: bytes[ATTR_OFFSET],
            first_block: u16::from_le_bytes([
                bytes[FIRST_BLOCK_OFFSET],
                bytes[FIRST_BLOCK_OFFSET + 1],
            ]),
            file_size: u32::from_le_bytes([
                bytes[SIZE_OFFSET],
                bytes[SIZE_OFFSET + 1],
                bytes[SIZE_OFFSET + 2],
                bytes[SIZE_OFFSET + 3],
            ]),
        }
    }

    pub fn encode(&self, bytes: &mut [u8]) {
        debug_assert_eq!(DIR_ENTRY_SIZE, bytes.len());

        bytes[..NAME_CAP].copy_from_slice(&self.name);
        bytes[ATTR_OFFSET] = self.attr;
        bytes[FIRST_BLOCK_OFFSET..SIZE_OFFSET].copy_from_slice(&self.first_block.to_le_bytes());
        bytes[SIZE_OFFSET..].copy_from_slice(&self.file_size.to_le_bytes());
    }

    pub fn status(&self) -> DirEntryStatus {
        match self.attr {
            ATTR_FREE => DirEntryStatus::Free,
            _ => DirEntryStatus::Occupied,
        }
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.status() == DirEntryStatus::Free
    }

    /// 无法识别的属性返回`None`
    pub fn kind(&self) -> Option<DirEntryType> {
        match self.attr {
            0x01 => Some(DirEntryType::Regular),
            0x02 => Some(DirEntryType::Directory),
            _ => None,
        }
    }

    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(NAME_CAP);
        &self.name[..len]
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }

    /// 占用的槽位才有名字
    #[inline]
    pub fn is_named(&self, name: &str) -> bool {
        !self.is_free() && self.name_bytes() == name.as_bytes()
    }

    #[inline]
    pub fn first_block(&self) -> BlockId {
        BlockId::new(self.first_block as usize)
    }

    pub fn set_first_block(&mut self, id: BlockId) {
        self.first_block = id.raw() as u16;
    }

    #[inline]
    pub const fn size(&self) -> u32 {
        self.file_size
    }

    pub fn resize(&mut self, size: u32) {
        self.file_size = size;
    }
}

/// 属性无法识别的目录项视为损坏
impl TryFrom<&DirEntry> for vfs::DirEntry {
    type Error = vfs::Error;

    fn try_from(dirent: &DirEntry) -> vfs::Result<Self> {
        Ok(Self {
            name: dirent.name(),
            ty: dirent.kind().ok_or(vfs::Error::Corrupted)?,
            size: dirent.size(),
            first_block: dirent.first_block,
        })
    }
}

/// 路径分量能否作为文件名
pub fn check_name(name: &str) -> vfs::Result<()> {
    if name.is_empty() || name.bytes().any(|b| b == 0 || b == b'/') {
        Err(vfs::Error::InvalidPath)
    } else if name.len() > NAME_MAX {
        Err(vfs::Error::NameTooLong)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let first_block = BlockId::new(0x0102);
        let dirent = DirEntry::new("hello.txt", DirEntryType::Regular, first_block).unwrap();
        let mut bytes = [0xaa; DIR_ENTRY_SIZE];
        dirent.encode(&mut bytes);

        assert_eq!(b"hello.txt\0", &bytes[..10]);
        assert!(bytes[10..25].iter().all(|&b| b == 0));
        assert_eq!(1, bytes[25]);
        assert_eq!([0x02u8, 0x01], bytes[26..28]);
        assert_eq!([0u8; 4], bytes[28..32]);
        assert_eq!(dirent, DirEntry::decode(&bytes));
    }

    #[test]
    fn free_slot_is_all_zero() {
        let mut bytes = [0xaa; DIR_ENTRY_SIZE];
        DirEntry::FREE.encode(&mut bytes);
        assert_eq!([0u8; DIR_ENTRY_SIZE], bytes);
        assert!(DirEntry::decode(&bytes).is_free());
    }

    #[test]
    fn longest_name_keeps_terminator() {
        let name = "a".repeat(NAME_MAX);
        let dirent = DirEntry::new(&name, DirEntryType::Directory, BlockId::new(9)).unwrap();
        let mut bytes = [0; DIR_ENTRY_SIZE];
        dirent.encode(&mut bytes);

        assert_eq!(0, bytes[NAME_MAX]);
        assert!(dirent.is_named(&name));
        assert_eq!(Some(DirEntryType::Directory), dirent.kind());
    }

    #[test]
    fn bad_names() {
        let long = "a".repeat(NAME_MAX + 1);
        assert_eq!(Err(vfs::Error::NameTooLong), check_name(&long));
        assert_eq!(Err(vfs::Error::InvalidPath), check_name(""));
        assert_eq!(Err(vfs::Error::InvalidPath), check_name("a/b"));
        assert_eq!(Err(vfs::Error::InvalidPath), check_name("a\0"));
    }

    #[test]
    fn match_is_exact() {
        let dirent = DirEntry::new("Notes", DirEntryType::Regular, BlockId::new(9)).unwrap();
        assert!(dirent.is_named("Notes"));
        assert!(!dirent.is_named("notes"));
        assert!(!dirent.is_named("Note"));
        assert!(!DirEntry::FREE.is_named(""));
    }
}
