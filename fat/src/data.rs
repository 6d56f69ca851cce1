//! 文件内容的读写
//!
//! 文件内容由`pattern`重复`repeat`次得到。文件的实际长度只看目录项中记录的大小，
//! 块中超出大小的部分总是0。

use alloc::vec;
use alloc::vec::Vec;

use vfs::{DirEntryType, Stat};

use crate::path::Slot;
use crate::volume::DirEntry;
use crate::{BlockId, FatFileSystem};

impl FatFileSystem {
    /// 用新内容替换文件，旧链表整个释放后重新分配。
    ///
    /// 空间不足时FAT与所有块都保持原样；写块失败时内存中的FAT回到块设备上的版本。
    pub fn overwrite(&mut self, path: &str, pattern: &[u8], repeat: usize) -> vfs::Result<()> {
        let slot = self.locate_file(path)?;
        let total = content_len(pattern, repeat)?;
        let block_size = self.geometry().block_size();
        let need = (total as usize).div_ceil(block_size).max(1);

        let old = self.fat.chain(slot.dirent.first_block())?;
        let available = self.fat.free_count() + old.len();
        if available < need {
            log::warn!("{path:?} needs {need} block(s), only {available} available");
            return Err(vfs::Error::OutOfSpace);
        }

        self.with_fat_rollback(|fs| {
            fs.fat.free_chain(slot.dirent.first_block())?;
            let head = fs.fat.alloc_chain(need)?;

            let mut buf = vec![0; block_size];
            for (i, id) in fs.fat.chain(head)?.into_iter().enumerate() {
                let start = i * block_size;
                let len = (total as usize).saturating_sub(start).min(block_size);
                buf.fill(0);
                fill_pattern(&mut buf[..len], pattern, start);
                fs.store.write_block(id, &buf)?;
            }

            fs.update_slot(&slot, |dirent| {
                dirent.set_first_block(head);
                dirent.resize(total);
            })?;
            fs.sync_fat()
        })?;

        log::debug!("wrote {total} byte(s) to {path:?} in {need} block(s)");
        Ok(())
    }

    /// 在文件末尾追加内容，首块保持不变。
    ///
    /// 写入位置由目录项中的大小算出，不会去看块中的内容。
    pub fn append(&mut self, path: &str, pattern: &[u8], repeat: usize) -> vfs::Result<()> {
        let slot = self.locate_file(path)?;
        let total = content_len(pattern, repeat)?;
        if total == 0 {
            return Ok(());
        }
        let size = slot.dirent.size();
        let new_size = size.checked_add(total).ok_or(vfs::Error::OutOfSpace)?;
        let total = total as usize;
        let block_size = self.geometry().block_size();

        let chain = self.fat.chain(slot.dirent.first_block())?;
        let used = (size as usize)
            .saturating_sub((chain.len() - 1) * block_size)
            .min(block_size);
        let room = block_size - used;
        let extra = total.saturating_sub(room).div_ceil(block_size);
        if extra > self.fat.free_count() {
            log::warn!("appending to {path:?} needs {extra} more block(s)");
            return Err(vfs::Error::OutOfSpace);
        }

        let last = self.fat.last(slot.dirent.first_block())?;
        let written = room.min(total);
        self.with_fat_rollback(|fs| {
            // 新块先写，最后一块的空余部分最后才填
            if extra > 0 {
                let head = fs.fat.alloc_chain(extra)?;
                fs.fat.couple(last, head)?;

                let mut offset = written;
                let mut buf = vec![0; block_size];
                for id in fs.fat.chain(head)? {
                    let len = (total - offset).min(block_size);
                    buf.fill(0);
                    fill_pattern(&mut buf[..len], pattern, offset);
                    fs.store.write_block(id, &buf)?;
                    offset += len;
                }
            }

            if written > 0 {
                let mut buf = fs.store.read_block(last)?;
                fill_pattern(&mut buf[used..used + written], pattern, 0);
                fs.store.write_block(last, &buf)?;
            }

            fs.update_slot(&slot, |dirent| dirent.resize(new_size))?;
            fs.sync_fat()
        })?;

        log::debug!("appended {total} byte(s) to {path:?}, {extra} new block(s)");
        Ok(())
    }

    /// 链表上所有块的完整内容
    pub fn read_all(&self, path: &str) -> vfs::Result<Vec<u8>> {
        let slot = self.locate_file(path)?;
        self.read_chain(&slot)
    }

    /// 文件内容，按记录的大小截断。
    pub fn read(&self, path: &str) -> vfs::Result<Vec<u8>> {
        let slot = self.locate_file(path)?;
        let mut data = self.read_chain(&slot)?;
        if data.len() < slot.dirent.size() as usize {
            log::error!("{path:?} is shorter than its recorded size");
            return Err(vfs::Error::Corrupted);
        }
        data.truncate(slot.dirent.size() as usize);
        Ok(data)
    }

    pub fn stat(&self, path: &str) -> vfs::Result<Stat> {
        let dirent = self.lookup(path)?;
        let blocks = self.fat.chain(BlockId::new(dirent.first_block as usize))?;

        Ok(Stat {
            mode: dirent.ty,
            block_size: self.geometry().block_size() as u64,
            blocks: blocks.len() as u64,
            size: match dirent.ty {
                DirEntryType::Regular => dirent.size as u64,
                DirEntryType::Directory => 0,
            },
        })
    }
}

impl FatFileSystem {
    fn read_chain(&self, slot: &Slot) -> vfs::Result<Vec<u8>> {
        let chain = self.fat.chain(slot.dirent.first_block())?;
        let mut data = Vec::with_capacity(chain.len() * self.geometry().block_size());
        for id in chain {
            data.extend(self.store.read_block(id)?);
        }
        Ok(data)
    }

    fn update_slot(&self, slot: &Slot, f: impl FnOnce(&mut DirEntry)) -> vfs::Result<()> {
        self.store.map_dir_mut(slot.parent, |dirents| {
            f(&mut dirents[slot.nth]);
            Ok(())
        })
    }
}

/// 内容总长度，放不进`u32`的视为空间不足。
fn content_len(pattern: &[u8], repeat: usize) -> vfs::Result<u32> {
    pattern
        .len()
        .checked_mul(repeat)
        .and_then(|total| u32::try_from(total).ok())
        .ok_or(vfs::Error::OutOfSpace)
}

/// 从内容的第`offset`字节开始，把重复的`pattern`填入`buf`。
fn fill_pattern(buf: &mut [u8], pattern: &[u8], offset: usize) {
    if pattern.is_empty() {
        return;
    }
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = pattern[(offset + i) % pattern.len()];
    }
}
