//! 卷的几何参数
//!
//! FAT区 | 根目录 | 数据区
//!
//! FAT区从0号块开始，占`fat_blocks`块；根目录紧随其后，
//! 固定占一块；其余都是数据区。

use core::mem;

use crate::BlockId;
use crate::entry::FatEntry;
use crate::volume::DIR_ENTRY_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    block_size: usize,
    blocks: usize,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Geometry {
    /// 1 KiB的块，共2048块
    pub const DEFAULT: Self = Self {
        block_size: 1024,
        blocks: 2048,
    };

    /// 检查参数能否构成一个可用的卷：
    /// 块大小是目录项大小的整数倍，块编号装得进15位指针，
    /// 根目录之后至少还有一个数据块。
    pub fn new(block_size: usize, blocks: usize) -> vfs::Result<Self> {
        let geometry = Self { block_size, blocks };

        if block_size == 0
            || block_size % DIR_ENTRY_SIZE != 0
            || blocks > FatEntry::RESERVED.raw() as usize
            || geometry.first_data() >= blocks
        {
            return Err(vfs::Error::InvalidArgument);
        }

        Ok(geometry)
    }

    #[inline]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub const fn blocks(&self) -> usize {
        self.blocks
    }

    /// 一个目录块能容纳的目录项数
    #[inline]
    pub const fn dir_entries(&self) -> usize {
        self.block_size / DIR_ENTRY_SIZE
    }

    /// FAT本身的字节数，每块一个`u16`
    #[inline]
    pub const fn fat_bytes(&self) -> usize {
        self.blocks * mem::size_of::<u16>()
    }

    /// FAT区占用的块数
    #[inline]
    pub const fn fat_blocks(&self) -> usize {
        self.fat_bytes().div_ceil(self.block_size)
    }

    #[inline]
    pub const fn root(&self) -> BlockId {
        BlockId::new(self.fat_blocks())
    }

    /// 首个可分配的块
    #[inline]
    pub const fn first_data(&self) -> usize {
        self.fat_blocks() + 1
    }

    /// 后备文件的总字节数
    #[inline]
    pub const fn image_bytes(&self) -> usize {
        self.blocks * self.block_size
    }

    #[inline]
    pub const fn contains(&self, id: BlockId) -> bool {
        id.raw() < self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let g = Geometry::DEFAULT;
        assert_eq!(32, g.dir_entries());
        assert_eq!(4, g.fat_blocks());
        assert_eq!(BlockId::new(4), g.root());
        assert_eq!(5, g.first_data());
        assert_eq!(2048 * 1024, g.image_bytes());
    }

    #[test]
    fn partial_fat_block() {
        let g = Geometry::new(64, 40).unwrap();
        assert_eq!(2, g.dir_entries());
        assert_eq!(2, g.fat_blocks());
        assert_eq!(BlockId::new(2), g.root());
    }

    #[test]
    fn rejected() {
        assert_eq!(Err(vfs::Error::InvalidArgument), Geometry::new(0, 16));
        assert_eq!(Err(vfs::Error::InvalidArgument), Geometry::new(100, 16));
        assert_eq!(Err(vfs::Error::InvalidArgument), Geometry::new(1024, 0x7fff));
        // 只有FAT区和根目录，没有数据块
        assert_eq!(Err(vfs::Error::InvalidArgument), Geometry::new(32, 2));
    }
}
