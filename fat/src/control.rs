use alloc::sync::Arc;

use block_dev::BlockDevice;

use crate::volume::Fat;
use crate::{BlockId, BlockStore, Geometry};

/// 整个文件系统：块设备加上内存中的FAT镜像。
///
/// 目录块和数据块不缓存，每次操作都从块设备读写；
/// 修改了FAT的操作在返回前把FAT写回。
#[derive(Debug)]
pub struct FatFileSystem {
    pub(crate) store: BlockStore,
    pub(crate) fat: Fat,
}

impl FatFileSystem {
    /// 在块设备上建立空的文件系统
    pub fn format(dev: Arc<dyn BlockDevice>, geometry: Geometry) -> vfs::Result<Self> {
        let mut fs = Self {
            store: BlockStore::new(dev, geometry),
            fat: Fat::new(geometry),
        };
        fs.init()?;
        Ok(fs)
    }

    /// 读取块设备上已有的文件系统
    pub fn load(dev: Arc<dyn BlockDevice>, geometry: Geometry) -> vfs::Result<Self> {
        let store = BlockStore::new(dev, geometry);
        let fat = Fat::from_entries(geometry, store.read_fat()?)?;
        log::info!("loaded FAT, {} free block(s)", fat.free_count());

        Ok(Self { store, fat })
    }

    /// 重置FAT，并清零根目录及全部数据块。
    pub fn init(&mut self) -> vfs::Result<()> {
        let geometry = *self.geometry();
        self.fat = Fat::new(geometry);
        self.sync_fat()?;

        for i in geometry.root().raw()..geometry.blocks() {
            self.store.zero_block(BlockId::new(i))?;
        }

        log::info!(
            "formatted {} block(s) of {} bytes",
            geometry.blocks(),
            geometry.block_size()
        );
        Ok(())
    }

    /// 丢弃内存中的FAT，重新从块设备读取。
    pub fn reload(&mut self) -> vfs::Result<()> {
        self.fat = Fat::from_entries(*self.geometry(), self.store.read_fat()?)?;
        Ok(())
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        self.store.geometry()
    }

    #[inline]
    pub fn root(&self) -> BlockId {
        self.geometry().root()
    }

    #[inline]
    pub fn fat(&self) -> &Fat {
        &self.fat
    }

    #[inline]
    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub(crate) fn sync_fat(&self) -> vfs::Result<()> {
        self.store.write_fat(self.fat.entries())
    }

    /// 执行会修改FAT的操作。失败时内存中的FAT可能已与块设备不符，
    /// 丢弃它并重新读取块设备上的FAT。
    pub(crate) fn with_fat_rollback<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> vfs::Result<T>,
    ) -> vfs::Result<T> {
        let result = f(self);
        if let Err(e) = &result {
            log::warn!("update failed ({e}), reloading FAT");
            if let Err(reload) = self.reload() {
                log::error!("can't reload FAT: {reload}");
            }
        }
        result
    }
}

#[cfg(test)]
pub(crate) fn ram_fs(geometry: Geometry) -> (Arc<block_dev::RamDisk>, FatFileSystem) {
    let disk = Arc::new(block_dev::RamDisk::new(geometry.image_bytes()));
    let fs = FatFileSystem::format(disk.clone(), geometry).unwrap();
    (disk, fs)
}

/// 可以让指定块写入失败的内存块设备
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct FailingDisk {
    inner: block_dev::RamDisk,
    broken: core::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FailingDisk {
    pub fn new(bytes: usize) -> Self {
        Self {
            inner: block_dev::RamDisk::new(bytes),
            broken: core::sync::atomic::AtomicUsize::new(usize::MAX),
        }
    }

    /// 此后写入`block_id`都会失败
    pub fn break_block(&self, block_id: usize) {
        self.broken.store(block_id, core::sync::atomic::Ordering::Relaxed);
    }

    pub fn repair(&self) {
        self.break_block(usize::MAX);
    }

    pub fn snapshot(&self) -> alloc::vec::Vec<u8> {
        self.inner.snapshot()
    }
}

#[cfg(test)]
impl BlockDevice for FailingDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), block_dev::BlockError> {
        self.inner.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), block_dev::BlockError> {
        if block_id == self.broken.load(core::sync::atomic::Ordering::Relaxed) {
            return Err(block_dev::BlockError::Device);
        }
        self.inner.write_block(block_id, buf)
    }
}

#[cfg(test)]
pub(crate) fn failing_fs(geometry: Geometry) -> (Arc<FailingDisk>, FatFileSystem) {
    let disk = Arc::new(FailingDisk::new(geometry.image_bytes()));
    let fs = FatFileSystem::format(disk.clone(), geometry).unwrap();
    (disk, fs)
}

#[cfg(test)]
mod tests {
    use block_dev::RamDisk;

    use super::*;
    use crate::entry::FatEntry;

    #[test]
    fn format_then_load() {
        let geometry = Geometry::new(64, 40).unwrap();
        let (disk, mut fs) = ram_fs(geometry);
        fs.fat.alloc_chain(3).unwrap();
        fs.sync_fat().unwrap();

        let loaded = FatFileSystem::load(disk, geometry).unwrap();
        assert_eq!(fs.fat(), loaded.fat());
        assert_eq!(geometry.blocks() - geometry.first_data() - 3, loaded.fat().free_count());
    }

    #[test]
    fn init_zeroes_blocks() {
        let geometry = Geometry::new(64, 40).unwrap();
        let disk = Arc::new(RamDisk::new(geometry.image_bytes()));
        disk.write_block(10, &[0xaa; 64]).unwrap();

        let fs = FatFileSystem::format(disk.clone(), geometry).unwrap();
        let image = disk.snapshot();
        assert!(image[2 * 64..].iter().all(|&b| b == 0));
        assert_eq!([0xfeu8, 0x7f, 0xfe, 0x7f, 0xff, 0x7f], image[..6]);
        assert_eq!(Some(FatEntry::EOF), fs.fat().get(fs.root()));
    }

    #[test]
    fn reload_discards_memory() {
        let (_, mut fs) = ram_fs(Geometry::new(64, 40).unwrap());
        let before = fs.fat().clone();
        fs.fat.alloc_chain(2).unwrap();

        fs.reload().unwrap();
        assert_eq!(&before, fs.fat());
    }

    #[test]
    fn load_rejects_garbage() {
        let geometry = Geometry::new(64, 40).unwrap();
        let disk = Arc::new(RamDisk::new(geometry.image_bytes()));
        assert_eq!(
            vfs::Error::Corrupted,
            FatFileSystem::load(disk, geometry).unwrap_err()
        );
    }

    #[test]
    fn short_device() {
        let geometry = Geometry::new(64, 40).unwrap();
        let disk = Arc::new(RamDisk::new(64 * 10));
        assert_eq!(
            vfs::Error::Io(block_dev::BlockError::OutOfRange),
            FatFileSystem::format(disk, geometry).unwrap_err()
        );
    }

    #[test]
    fn rollback_restores_fat() {
        let (disk, mut fs) = failing_fs(Geometry::new(64, 40).unwrap());
        let before = fs.fat().clone();
        disk.break_block(5);

        let result = fs.with_fat_rollback(|fs| {
            let head = fs.fat.alloc_chain(4)?;
            fs.store.zero_block(BlockId::new(5))?;
            Ok(head)
        });
        assert_eq!(Err(vfs::Error::Io(block_dev::BlockError::Device)), result);
        assert_eq!(&before, fs.fat());
    }
}
