//! 路径解析
//!
//! 路径由`/`分隔，开头的`/`可有可无，空路径与`/`都指根目录。
//! 空分量（`a//b`、末尾的`/`）被跳过。

use alloc::string::String;

use vfs::DirEntryType;

use crate::volume::{DirEntry, check_name};
use crate::{BlockId, FatFileSystem};

/// 拆出父目录与最后一个分量。
/// 根目录的最后一个分量为空串。
pub fn split_parent(path: &str) -> (&str, &str) {
    let path = path.trim_end_matches('/');
    path.rsplit_once('/').unwrap_or(("", path))
}

/// 目录项在父目录中的位置
#[derive(Debug, Clone, Copy)]
pub(crate) struct Slot {
    pub parent: BlockId,
    pub nth: usize,
    pub dirent: DirEntry,
}

impl FatFileSystem {
    /// 目录路径对应的目录块
    pub fn resolve_directory(&self, path: &str) -> vfs::Result<BlockId> {
        self.walk(self.root(), path, DirEntryType::Directory)
    }

    /// 文件路径对应的首块
    pub fn resolve_file(&self, path: &str) -> vfs::Result<BlockId> {
        self.walk(self.root(), path, DirEntryType::Regular)
    }

    /// 描述任意路径的目录项，根目录以`/`表示。
    pub fn lookup(&self, path: &str) -> vfs::Result<vfs::DirEntry> {
        match self.locate(path) {
            Ok(slot) => vfs::DirEntry::try_from(&slot.dirent),
            Err(vfs::Error::InvalidPath) if split_parent(path).1.is_empty() => Ok(vfs::DirEntry {
                name: String::from("/"),
                ty: DirEntryType::Directory,
                size: 0,
                first_block: self.root().raw() as u16,
            }),
            Err(e) => Err(e),
        }
    }
}

impl FatFileSystem {
    /// 从`current`开始逐个分量向下搜索
    fn walk(&self, current: BlockId, path: &str, want: DirEntryType) -> vfs::Result<BlockId> {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return match want {
                DirEntryType::Directory => Ok(current),
                DirEntryType::Regular => Err(vfs::Error::InvalidPath),
            };
        }

        let (name, rest) = path.split_once('/').unwrap_or((path, ""));
        log::trace!("resolving {name:?} in block {current}");
        let dirent = self
            .find_cwd(current, name)?
            .ok_or(vfs::Error::NotFound)?
            .1;
        let is_last = rest.trim_start_matches('/').is_empty();

        match (dirent.kind(), is_last, want) {
            (Some(DirEntryType::Directory), false, _) => {
                self.walk(dirent.first_block(), rest, want)
            }
            (Some(DirEntryType::Directory), true, DirEntryType::Directory)
            | (Some(DirEntryType::Regular), true, DirEntryType::Regular) => {
                Ok(dirent.first_block())
            }
            (Some(DirEntryType::Directory), true, DirEntryType::Regular) => {
                Err(vfs::Error::IsADirectory)
            }
            (Some(DirEntryType::Regular), ..) => {
                log::debug!("{name:?} is a file, not a directory");
                Err(vfs::Error::NotADirectory)
            }
            (None, ..) => Err(vfs::Error::Corrupted),
        }
    }

    /// 搜索目录块中指定名称的项。
    pub(crate) fn find_cwd(
        &self,
        dir: BlockId,
        name: &str,
    ) -> vfs::Result<Option<(usize, DirEntry)>> {
        check_name(name)?;
        self.store.map_dir(dir, |dirents| {
            dirents
                .iter()
                .position(|dirent| dirent.is_named(name))
                .map(|nth| (nth, dirents[nth]))
        })
    }

    /// 定位路径最后一个分量的目录项
    pub(crate) fn locate(&self, path: &str) -> vfs::Result<Slot> {
        let (parent, name) = split_parent(path);
        let parent = self.resolve_directory(parent)?;
        let (nth, dirent) = self
            .find_cwd(parent, name)?
            .ok_or(vfs::Error::NotFound)?;

        Ok(Slot {
            parent,
            nth,
            dirent,
        })
    }

    /// 定位文件的目录项
    pub(crate) fn locate_file(&self, path: &str) -> vfs::Result<Slot> {
        let slot = self.locate(path)?;
        match slot.dirent.kind() {
            Some(DirEntryType::Regular) => Ok(slot),
            Some(DirEntryType::Directory) => Err(vfs::Error::IsADirectory),
            None => Err(vfs::Error::Corrupted),
        }
    }
}
