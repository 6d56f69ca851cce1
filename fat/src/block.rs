//! 块的抽象
//!
//! 除了FAT，所有块都不缓存：每次操作都从块设备读出，修改后立即写回。

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::mem;

use block_dev::{BlockDevice, BlockError};
use derive_more::Display;

use crate::Geometry;
use crate::entry::FatEntry;
use crate::volume::{DIR_ENTRY_SIZE, DirEntry};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct BlockId(usize);

impl BlockId {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> usize {
        self.0
    }
}

/// 块设备之上的定长块读写
#[derive(Clone)]
pub struct BlockStore {
    /// 底层块设备的引用
    dev: Arc<dyn BlockDevice>,
    geometry: Geometry,
}

impl core::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockStore")
            .field("geometry", &self.geometry)
            .finish_non_exhaustive()
    }
}

impl BlockStore {
    pub fn new(dev: Arc<dyn BlockDevice>, geometry: Geometry) -> Self {
        Self { dev, geometry }
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn read_block(&self, id: BlockId) -> vfs::Result<Vec<u8>> {
        self.validate_id(id)?;
        let mut data = vec![0; self.geometry.block_size()];
        self.dev.read_block(id.raw(), &mut data)?;
        log::trace!("read block {id}");
        Ok(data)
    }

    pub fn write_block(&self, id: BlockId, data: &[u8]) -> vfs::Result<()> {
        self.validate_id(id)?;
        if data.len() != self.geometry.block_size() {
            return Err(vfs::Error::InvalidArgument);
        }
        self.dev.write_block(id.raw(), data)?;
        log::trace!("wrote block {id}");
        Ok(())
    }

    #[inline]
    pub fn zero_block(&self, id: BlockId) -> vfs::Result<()> {
        self.write_block(id, &vec![0; self.geometry.block_size()])
    }

    /// 从0号块起读出整张FAT
    pub fn read_fat(&self) -> vfs::Result<Vec<FatEntry>> {
        let mut raw = Vec::with_capacity(self.geometry.fat_blocks() * self.geometry.block_size());
        for i in 0..self.geometry.fat_blocks() {
            raw.extend(self.read_block(BlockId::new(i))?);
        }

        Ok(raw[..self.geometry.fat_bytes()]
            .chunks_exact(mem::size_of::<FatEntry>())
            .map(|bytes| FatEntry::from_le_bytes([bytes[0], bytes[1]]))
            .collect())
    }

    /// 整张FAT写回0号块起的FAT区，最后一块的剩余部分填0。
    pub fn write_fat(&self, entries: &[FatEntry]) -> vfs::Result<()> {
        debug_assert_eq!(entries.len(), self.geometry.blocks());

        let mut raw = vec![0; self.geometry.fat_blocks() * self.geometry.block_size()];
        for (bytes, entry) in raw.chunks_exact_mut(mem::size_of::<FatEntry>()).zip(entries) {
            bytes.copy_from_slice(&entry.to_le_bytes());
        }

        for (i, data) in raw.chunks_exact(self.geometry.block_size()).enumerate() {
            self.write_block(BlockId::new(i), data)?;
        }
        Ok(())
    }

    /// 把块当作目录块读出
    pub fn map_dir<V>(&self, id: BlockId, f: impl FnOnce(&[DirEntry]) -> V) -> vfs::Result<V> {
        let dirents = self.read_dir(id)?;
        Ok(f(&dirents))
    }

    /// 把块当作目录块修改，`f`成功时才写回。
    pub fn map_dir_mut<V>(
        &self,
        id: BlockId,
        f: impl FnOnce(&mut [DirEntry]) -> vfs::Result<V>,
    ) -> vfs::Result<V> {
        let mut dirents = self.read_dir(id)?;
        let value = f(&mut dirents)?;

        let mut data = vec![0; self.geometry.block_size()];
        for (bytes, dirent) in data.chunks_exact_mut(DIR_ENTRY_SIZE).zip(&dirents) {
            dirent.encode(bytes);
        }
        self.write_block(id, &data)?;

        Ok(value)
    }

    fn read_dir(&self, id: BlockId) -> vfs::Result<Vec<DirEntry>> {
        Ok(self
            .read_block(id)?
            .chunks_exact(DIR_ENTRY_SIZE)
            .map(DirEntry::decode)
            .collect())
    }

    fn validate_id(&self, id: BlockId) -> Result<(), BlockError> {
        if self.geometry.contains(id) {
            Ok(())
        } else {
            Err(BlockError::OutOfRange)
        }
    }
}

#[cfg(test)]
mod tests {
    use block_dev::RamDisk;

    use vfs::DirEntryType;

    use super::*;

    fn store() -> (Arc<RamDisk>, BlockStore) {
        let geometry = Geometry::new(64, 40).unwrap();
        let disk = Arc::new(RamDisk::new(geometry.image_bytes()));
        (disk.clone(), BlockStore::new(disk, geometry))
    }

    #[test]
    fn block_id_display() {
        let id = BlockId::new(0x7ffd);
        assert_eq!("32765", alloc::format!("{id}"));
        assert_eq!(0x7ffd, id.raw());
        assert_eq!(FatEntry::new(0x7ffd), FatEntry::from(id));
    }

    #[test]
    fn block_roundtrip() {
        let (disk, store) = store();
        let data: Vec<u8> = (0..64).collect();
        store.write_block(BlockId::new(3), &data).unwrap();

        assert_eq!(data, store.read_block(BlockId::new(3)).unwrap());
        assert_eq!(&data[..], &disk.snapshot()[3 * 64..4 * 64]);
    }

    #[test]
    fn rejects_bad_transfers() {
        let (_, store) = store();
        assert_eq!(
            Err(vfs::Error::Io(BlockError::OutOfRange)),
            store.read_block(BlockId::new(40))
        );
        assert_eq!(
            Err(vfs::Error::InvalidArgument),
            store.write_block(BlockId::new(0), &[0; 32])
        );
    }

    #[test]
    fn fat_layout() {
        let (disk, store) = store();
        let mut entries = vec![FatEntry::FREE; 40];
        entries[0] = FatEntry::RESERVED;
        entries[39] = FatEntry::EOF;
        store.write_fat(&entries).unwrap();

        let image = disk.snapshot();
        assert_eq!([0xfeu8, 0x7f], image[0..2]);
        assert_eq!([0xffu8, 0x7f], image[78..80]);
        // 第二个FAT块的尾部
        assert!(image[80..128].iter().all(|&b| b == 0));

        assert_eq!(entries, store.read_fat().unwrap());
    }

    #[test]
    fn dir_mut_writes_back_on_success() {
        let (_, store) = store();
        let id = BlockId::new(5);

        store
            .map_dir_mut(id, |dirents| {
                dirents[1] = DirEntry::new("a", DirEntryType::Regular, BlockId::new(7))?;
                Ok(())
            })
            .unwrap();
        let _ = store.map_dir_mut(id, |dirents| {
            dirents[0] = dirents[1];
            Err::<(), _>(vfs::Error::DirectoryFull)
        });

        store
            .map_dir(id, |dirents| {
                assert!(dirents[0].is_free());
                assert!(dirents[1].is_named("a"));
                assert_eq!(BlockId::new(7), dirents[1].first_block());
            })
            .unwrap();
    }
}
