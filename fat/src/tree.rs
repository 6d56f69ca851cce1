//! 目录树的增删
//!
//! 每个目录恰好占一块，所以目录的容量就是一块中的槽位数。

use vfs::DirEntryType;

use crate::volume::{DirEntry, check_name};
use crate::{BlockId, FatFileSystem, split_parent};

impl FatFileSystem {
    /// 在`parent`目录块中新建一项，返回为它分配的首块。
    ///
    /// 重名与目录已满都在分配之前检查，写块失败时分配的块也会还回去。
    pub fn create_entry(
        &mut self,
        parent: BlockId,
        name: &str,
        ty: DirEntryType,
    ) -> vfs::Result<BlockId> {
        check_name(name)?;

        let (duplicate, slot) = self.store.map_dir(parent, |dirents| {
            (
                dirents.iter().any(|dirent| dirent.is_named(name)),
                dirents.iter().position(DirEntry::is_free),
            )
        })?;
        if duplicate {
            return Err(vfs::Error::DuplicateName);
        }
        let Some(nth) = slot else {
            log::warn!("directory block {parent} is full, can't add {name:?}");
            return Err(vfs::Error::DirectoryFull);
        };

        let first_block = self.with_fat_rollback(|fs| {
            let first_block = fs.fat.alloc_chain(1)?;
            let dirent = DirEntry::new(name, ty, first_block)?;
            fs.store.zero_block(first_block)?;
            fs.store.map_dir_mut(parent, |dirents| {
                dirents[nth] = dirent;
                Ok(())
            })?;
            fs.sync_fat()?;
            Ok(first_block)
        })?;

        log::debug!("created {ty:?} {name:?} at block {first_block} in {parent}");
        Ok(first_block)
    }

    /// 新建目录，返回其目录块。
    /// 单个分量的路径以根目录为父目录。
    pub fn mkdir(&mut self, path: &str) -> vfs::Result<BlockId> {
        let (parent, name) = split_parent(path);
        let parent = self.resolve_directory(parent)?;
        self.create_entry(parent, name, DirEntryType::Directory)
    }

    /// 新建空文件，返回其首块。
    pub fn create(&mut self, path: &str) -> vfs::Result<BlockId> {
        let (parent, name) = split_parent(path);
        let parent = self.resolve_directory(parent)?;
        self.create_entry(parent, name, DirEntryType::Regular)
    }

    /// 删除文件或空目录
    pub fn unlink(&mut self, path: &str) -> vfs::Result<()> {
        let slot = self.locate(path)?;
        let head = slot.dirent.first_block();

        match slot.dirent.kind() {
            Some(DirEntryType::Regular) => {
                self.fat.free_chain(head)?;
            }
            Some(DirEntryType::Directory) => {
                if !self.is_empty_dir(head)? {
                    return Err(vfs::Error::DirectoryNotEmpty);
                }
                self.fat.release(head)?;
            }
            None => return Err(vfs::Error::Corrupted),
        }

        self.clear_slot(slot.parent, slot.nth)?;
        log::debug!("unlinked {path:?}");
        Ok(())
    }

    /// 删除文件，或者连同其中所有内容删除整个目录。
    pub fn remove_all(&mut self, path: &str) -> vfs::Result<()> {
        let slot = self.locate(path)?;
        self.reclaim(&slot.dirent, 0)?;
        self.clear_slot(slot.parent, slot.nth)?;

        log::debug!("removed {path:?} recursively");
        Ok(())
    }

    pub fn is_empty_dir(&self, dir: BlockId) -> vfs::Result<bool> {
        self.store.map_dir(dir, |dirents| dirents.iter().all(DirEntry::is_free))
    }
}

impl FatFileSystem {
    /// 深度优先释放目录项拥有的全部块
    fn reclaim(&mut self, dirent: &DirEntry, depth: usize) -> vfs::Result<()> {
        let head = dirent.first_block();

        match dirent.kind() {
            Some(DirEntryType::Regular) => {
                self.fat.free_chain(head)?;
            }
            Some(DirEntryType::Directory) => {
                // 目录树的深度不可能超过块数，否则必然成环
                if depth >= self.geometry().blocks() {
                    log::error!("directory tree under block {head} doesn't terminate");
                    return Err(vfs::Error::Corrupted);
                }

                let children = self.store.map_dir_mut(head, |dirents| {
                    let children: alloc::vec::Vec<_> =
                        dirents.iter().filter(|d| !d.is_free()).copied().collect();
                    dirents.fill(DirEntry::FREE);
                    Ok(children)
                })?;
                for child in &children {
                    self.reclaim(child, depth + 1)?;
                }
                self.fat.release(head)?;
            }
            None => return Err(vfs::Error::Corrupted),
        }

        Ok(())
    }

    fn clear_slot(&mut self, parent: BlockId, nth: usize) -> vfs::Result<()> {
        self.store.map_dir_mut(parent, |dirents| {
            dirents[nth] = DirEntry::FREE;
            Ok(())
        })?;
        self.sync_fat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Geometry;
    use crate::control::{failing_fs, ram_fs};
    use crate::entry::FatEntry;

    /// 每个目录8项，数据区为2..32
    fn geometry() -> Geometry {
        Geometry::new(256, 32).unwrap()
    }

    #[test]
    fn create_then_resolve() {
        let (_, mut fs) = ram_fs(geometry());
        let dir = fs.mkdir("/a").unwrap();
        let file = fs.create("/a/b.txt").unwrap();

        assert_eq!(BlockId::new(2), dir);
        assert_eq!(BlockId::new(3), file);
        assert_eq!(file, fs.resolve_file("/a/b.txt").unwrap());
        assert_eq!(Some(FatEntry::EOF), fs.fat().get(file));
        assert!(fs.is_empty_dir(dir).unwrap());
    }

    #[test]
    fn duplicate_changes_nothing() {
        let (disk, mut fs) = ram_fs(geometry());
        fs.mkdir("/a").unwrap();
        let image = disk.snapshot();
        let fat = fs.fat().clone();

        assert_eq!(Err(vfs::Error::DuplicateName), fs.mkdir("/a"));
        assert_eq!(Err(vfs::Error::DuplicateName), fs.create("a"));
        assert_eq!(image, disk.snapshot());
        assert_eq!(&fat, fs.fat());
    }

    #[test]
    fn full_directory_leaks_nothing() {
        let (_, mut fs) = ram_fs(geometry());
        for i in 0..geometry().dir_entries() {
            fs.create(&alloc::format!("f{i}")).unwrap();
        }
        let free = fs.fat().free_count();

        assert_eq!(Err(vfs::Error::DirectoryFull), fs.create("/one-more"));
        assert_eq!(free, fs.fat().free_count());
    }

    #[test]
    fn out_of_space() {
        // 只有2个数据块
        let (_, mut fs) = ram_fs(Geometry::new(256, 4).unwrap());
        fs.create("/a").unwrap();
        fs.mkdir("/b").unwrap();

        assert_eq!(Err(vfs::Error::OutOfSpace), fs.create("/c"));
        assert_eq!(Err(vfs::Error::NotFound), fs.resolve_file("/c"));
    }

    #[test]
    fn bad_parents() {
        let (_, mut fs) = ram_fs(geometry());
        fs.create("/f").unwrap();

        assert_eq!(Err(vfs::Error::NotFound), fs.mkdir("/missing/a"));
        assert_eq!(Err(vfs::Error::NotADirectory), fs.create("/f/a"));
        assert_eq!(Err(vfs::Error::InvalidPath), fs.mkdir("/"));
        assert_eq!(
            Err(vfs::Error::NameTooLong),
            fs.create("/abcdefghijklmnopqrstuvwxyz")
        );
    }

    #[test]
    fn unlink_requires_empty_directory() {
        let (_, mut fs) = ram_fs(geometry());
        let dir = fs.mkdir("/d").unwrap();
        fs.create("/d/f").unwrap();

        assert_eq!(Err(vfs::Error::DirectoryNotEmpty), fs.unlink("/d"));
        assert_eq!(dir, fs.resolve_directory("/d").unwrap());

        fs.unlink("/d/f").unwrap();
        fs.unlink("/d").unwrap();
        assert_eq!(Some(FatEntry::FREE), fs.fat().get(dir));
        assert_eq!(Err(vfs::Error::NotFound), fs.resolve_directory("/d"));
        assert!(fs.is_empty_dir(fs.root()).unwrap());
    }

    #[test]
    fn unlink_errors() {
        let (_, mut fs) = ram_fs(geometry());
        assert_eq!(Err(vfs::Error::InvalidPath), fs.unlink("/"));
        assert_eq!(Err(vfs::Error::NotFound), fs.unlink("/nothing"));
    }

    #[test]
    fn unlink_frees_whole_chain() {
        let (_, mut fs) = ram_fs(geometry());
        let free = fs.fat().free_count();
        fs.create("/big").unwrap();
        fs.overwrite("/big", b"0123456789", 100).unwrap();
        assert_eq!(free - 4, fs.fat().free_count());

        fs.unlink("/big").unwrap();
        assert_eq!(free, fs.fat().free_count());
    }

    #[test]
    fn remove_all_reclaims_subtree() {
        let (_, mut fs) = ram_fs(geometry());
        let free = fs.fat().free_count();
        fs.mkdir("/a").unwrap();
        fs.mkdir("/a/b").unwrap();
        fs.create("/a/b/c").unwrap();
        fs.create("/a/d").unwrap();
        fs.overwrite("/a/d", b"xy", 300).unwrap();
        fs.create("/keep").unwrap();

        fs.remove_all("/a").unwrap();
        assert_eq!(free - 1, fs.fat().free_count());
        assert_eq!(Err(vfs::Error::NotFound), fs.resolve_directory("/a"));
        assert!(fs.resolve_file("/keep").is_ok());
    }

    #[test]
    fn remove_all_on_file() {
        let (_, mut fs) = ram_fs(geometry());
        let head = fs.create("/f").unwrap();
        fs.remove_all("f").unwrap();
        assert_eq!(Some(FatEntry::FREE), fs.fat().get(head));
    }

    #[test]
    fn failed_create_releases_block() {
        let (disk, mut fs) = failing_fs(geometry());
        let fat = fs.fat().clone();
        let image = disk.snapshot();

        // 新块清零失败
        disk.break_block(2);
        assert_eq!(
            Err(vfs::Error::Io(block_dev::BlockError::Device)),
            fs.create("/a")
        );
        assert_eq!(&fat, fs.fat());
        assert_eq!(Some(FatEntry::FREE), fs.fat().get(BlockId::new(2)));
        assert_eq!(Err(vfs::Error::NotFound), fs.lookup("/a"));

        // 父目录写回失败
        disk.break_block(fs.root().raw());
        assert_eq!(
            Err(vfs::Error::Io(block_dev::BlockError::Device)),
            fs.mkdir("/d")
        );
        assert_eq!(&fat, fs.fat());
        assert_eq!(image, disk.snapshot());

        disk.repair();
        assert_eq!(BlockId::new(2), fs.create("/a").unwrap());
        assert!(fs.check().unwrap().is_clean());
    }
}
