use alloc::vec;
use alloc::vec::Vec;
use core::ops::Range;

use crate::entry::{EntryError, FatEntry};
use crate::{BlockId, Geometry};

/// 内存中的FAT镜像，是文件系统唯一长期驻留内存的状态。
///
/// 所有分配与释放都在这里完成，由调用方负责写回块设备。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fat {
    entries: Vec<FatEntry>,
    geometry: Geometry,
}

impl Fat {
    /// 刚格式化的FAT：FAT区保留，根目录为链尾，其余空闲。
    pub fn new(geometry: Geometry) -> Self {
        let mut entries = vec![FatEntry::FREE; geometry.blocks()];
        entries[..geometry.fat_blocks()].fill(FatEntry::RESERVED);
        entries[geometry.root().raw()] = FatEntry::EOF;

        Self { entries, geometry }
    }

    /// 接管从块设备读出的FAT
    pub fn from_entries(geometry: Geometry, entries: Vec<FatEntry>) -> vfs::Result<Self> {
        if entries.len() != geometry.blocks() {
            return Err(vfs::Error::Corrupted);
        }
        if entries[geometry.root().raw()] != FatEntry::EOF {
            log::error!("root directory isn't marked as end of chain");
            return Err(vfs::Error::Corrupted);
        }

        Ok(Self { entries, geometry })
    }

    #[inline]
    pub fn entries(&self) -> &[FatEntry] {
        &self.entries
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> Option<FatEntry> {
        self.entries.get(id.raw()).copied()
    }

    pub fn free_count(&self) -> usize {
        self.data_range()
            .filter(|&i| self.entries[i].is_free())
            .count()
    }

    /// 获取下一个块编号。
    /// `Ok(None)`表示`id`为链表上最后一个块；
    /// 链表指向空闲块、保留块或越界都视为损坏。
    pub fn next(&self, id: BlockId) -> vfs::Result<Option<BlockId>> {
        let id = self.validate_id(id)?;

        match self.entries[id.raw()].validate() {
            Ok(next) => self.validate_id(next).map(Some),
            Err(EntryError::Eof) => Ok(None),
            Err(e) => {
                log::error!("block {id} is linked but marked {e:?}");
                Err(vfs::Error::Corrupted)
            }
        }
    }

    /// 收集整条链表，最多走`blocks`步。
    pub fn chain(&self, head: BlockId) -> vfs::Result<Vec<BlockId>> {
        let mut chain = Vec::new();
        let mut current = Some(head);

        while let Some(id) = current {
            if chain.len() == self.entries.len() {
                log::error!("chain from {head} doesn't terminate");
                return Err(vfs::Error::Corrupted);
            }
            chain.push(id);
            current = self.next(id)?;
        }

        Ok(chain)
    }

    /// 链表上的最后一个块
    pub fn last(&self, head: BlockId) -> vfs::Result<BlockId> {
        let mut current = head;
        for _ in 0..self.entries.len() {
            match self.next(current)? {
                Some(next) => current = next,
                None => return Ok(current),
            }
        }

        log::error!("chain from {head} doesn't terminate");
        Err(vfs::Error::Corrupted)
    }

    /// 按编号升序首次适配，分配`n`个块并串成链表，返回首块。
    /// 空闲块不足时不做任何修改。
    pub fn alloc_chain(&mut self, n: usize) -> vfs::Result<BlockId> {
        if n == 0 {
            return Err(vfs::Error::InvalidArgument);
        }

        let ids: Vec<usize> = self
            .data_range()
            .filter(|&i| self.entries[i].is_free())
            .take(n)
            .collect();
        if ids.len() < n {
            log::warn!("need {n} block(s), only {} free", ids.len());
            return Err(vfs::Error::OutOfSpace);
        }

        for pair in ids.windows(2) {
            self.entries[pair[0]] = BlockId::new(pair[1]).into();
        }
        self.entries[ids[n - 1]] = FatEntry::EOF;

        let head = BlockId::new(ids[0]);
        log::debug!("allocated {n} block(s) from {head}");
        Ok(head)
    }

    /// 移除整个链表，返回释放的块数。
    /// 链表损坏时不做任何修改。
    pub fn free_chain(&mut self, head: BlockId) -> vfs::Result<usize> {
        self.ensure_data(head)?;

        let chain = self.chain(head)?;
        for id in &chain {
            self.entries[id.raw()] = FatEntry::FREE;
        }

        log::debug!("freed {} block(s) from {head}", chain.len());
        Ok(chain.len())
    }

    /// 释放单独一块，它必须是链尾。
    pub fn release(&mut self, id: BlockId) -> vfs::Result<()> {
        self.ensure_data(id)?;
        if self.entries[id.raw()] != FatEntry::EOF {
            log::error!("block {id} isn't a single-block chain");
            return Err(vfs::Error::Corrupted);
        }

        self.entries[id.raw()] = FatEntry::FREE;
        log::debug!("freed block {id}");
        Ok(())
    }

    /// 把`head`开始的链表接在链尾`tail`之后
    pub fn couple(&mut self, tail: BlockId, head: BlockId) -> vfs::Result<()> {
        self.ensure_data(tail)?;
        self.ensure_data(head)?;
        if self.entries[tail.raw()] != FatEntry::EOF {
            return Err(vfs::Error::Corrupted);
        }

        self.entries[tail.raw()] = head.into();
        Ok(())
    }
}

impl Fat {
    /// 可分配的块
    fn data_range(&self) -> Range<usize> {
        self.geometry.first_data()..self.geometry.blocks()
    }

    /// 链表只能落在根目录及数据区
    fn validate_id(&self, id: BlockId) -> vfs::Result<BlockId> {
        if id >= self.geometry.root() && self.geometry.contains(id) {
            Ok(id)
        } else {
            log::error!("block {id} is outside the data area");
            Err(vfs::Error::Corrupted)
        }
    }

    /// 根目录与FAT区永远不能被释放或链接
    fn ensure_data(&self, id: BlockId) -> vfs::Result<()> {
        if self.data_range().contains(&id.raw()) {
            Ok(())
        } else {
            Err(vfs::Error::InvalidArgument)
        }
    }
}
