//! 目录列表、FAT转储与一致性检查

use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use enumflags2::{BitFlags, bitflags};
use vfs::DirEntryType;

use crate::entry::{EntryError, FatEntry};
use crate::volume::DirEntry;
use crate::{BlockId, FatFileSystem};

/// FAT中一个块的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// FAT区
    Reserved,
    /// 根目录
    Root,
    Free,
    /// 链尾
    Terminal,
    Next(BlockId),
    /// 无法解释的值
    Unknown(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub id: BlockId,
    pub state: BlockState,
    /// 链表包含这个块的文件或目录的完整路径
    pub owner: Option<String>,
}

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// FAT区或根目录的标记被破坏
    Markers = 0b0000_0001,
    /// 链表成环、断开或越界
    BrokenChain = 0b0000_0010,
    /// 同一个块属于两个链表
    CrossLinked = 0b0000_0100,
    /// 已分配却不属于任何文件或目录
    Leaked = 0b0000_1000,
    /// 目录项的属性、首块或大小不合法
    BadEntry = 0b0001_0000,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub faults: BitFlags<Fault>,
    pub blocks: Vec<(BlockId, Fault)>,
}

impl CheckReport {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }

    fn push(&mut self, id: BlockId, fault: Fault) {
        log::error!("block {id}: {fault:?}");
        self.faults |= fault;
        self.blocks.push((id, fault));
    }
}

/// 从根目录出发深度优先得到的块归属
struct Survey {
    owners: Vec<Option<String>>,
    report: CheckReport,
}

impl FatFileSystem {
    /// 按槽位顺序列出目录中的所有项，属性损坏的项被跳过。
    pub fn list_directory(&self, path: &str) -> vfs::Result<Vec<vfs::DirEntry>> {
        let dir = self.resolve_directory(path)?;
        self.store.map_dir(dir, |dirents| {
            dirents
                .iter()
                .filter(|dirent| !dirent.is_free())
                .filter_map(|dirent| match vfs::DirEntry::try_from(dirent) {
                    Ok(entry) => Some(entry),
                    Err(_) => {
                        log::warn!("skipping {:?} in block {dir}: bad attribute", dirent.name());
                        None
                    }
                })
                .collect()
        })
    }

    /// 每个块在FAT中的记录及其归属
    pub fn dump_allocation(&self) -> vfs::Result<Vec<BlockRecord>> {
        let survey = self.survey()?;

        Ok(self
            .fat
            .entries()
            .iter()
            .zip(survey.owners)
            .enumerate()
            .map(|(i, (&entry, owner))| BlockRecord {
                id: BlockId::new(i),
                state: self.block_state(BlockId::new(i), entry),
                owner,
            })
            .collect())
    }

    /// 检查FAT与目录树是否互相吻合
    pub fn check(&self) -> vfs::Result<CheckReport> {
        let Survey { owners, mut report } = self.survey()?;
        let geometry = *self.geometry();

        for (i, (&entry, owner)) in self.fat.entries().iter().zip(&owners).enumerate() {
            let id = BlockId::new(i);
            match self.block_state(id, entry) {
                BlockState::Reserved if i < geometry.fat_blocks() => {}
                BlockState::Root => {}
                _ if i < geometry.fat_blocks() || id == geometry.root() => {
                    report.push(id, Fault::Markers)
                }
                BlockState::Reserved | BlockState::Unknown(_) => report.push(id, Fault::Markers),
                BlockState::Free => {}
                BlockState::Terminal | BlockState::Next(_) if owner.is_none() => {
                    report.push(id, Fault::Leaked)
                }
                BlockState::Terminal | BlockState::Next(_) => {}
            }
        }

        if report.is_clean() {
            log::info!("filesystem is consistent");
        }
        Ok(report)
    }
}

impl FatFileSystem {
    fn block_state(&self, id: BlockId, entry: FatEntry) -> BlockState {
        if id == self.root() && entry == FatEntry::EOF {
            return BlockState::Root;
        }

        match entry.validate() {
            Ok(next) => BlockState::Next(next),
            Err(EntryError::Free) => BlockState::Free,
            Err(EntryError::Eof) => BlockState::Terminal,
            Err(EntryError::Reserved) if entry == FatEntry::RESERVED => BlockState::Reserved,
            Err(EntryError::Reserved) => BlockState::Unknown(entry.raw()),
        }
    }

    fn survey(&self) -> vfs::Result<Survey> {
        let mut survey = Survey {
            owners: vec![None; self.geometry().blocks()],
            report: CheckReport::default(),
        };
        survey.owners[self.root().raw()] = Some(String::from("/"));
        self.survey_dir(self.root(), "", &mut survey)?;

        Ok(survey)
    }

    fn survey_dir(&self, dir: BlockId, prefix: &str, survey: &mut Survey) -> vfs::Result<()> {
        let geometry = *self.geometry();
        let dirents: Vec<DirEntry> = self.store.map_dir(dir, |dirents| {
            dirents.iter().filter(|d| !d.is_free()).copied().collect()
        })?;

        for dirent in &dirents {
            let path = format!("{prefix}/{}", dirent.name());
            let head = dirent.first_block();

            let Some(ty) = dirent.kind() else {
                survey.report.push(dir, Fault::BadEntry);
                continue;
            };
            if head.raw() < geometry.first_data() || !geometry.contains(head) {
                survey.report.push(dir, Fault::BadEntry);
                continue;
            }
            let chain = match self.fat.chain(head) {
                Ok(chain) => chain,
                Err(vfs::Error::Corrupted) => {
                    survey.report.push(head, Fault::BrokenChain);
                    self.claim_broken(head, &path, survey);
                    continue;
                }
                Err(e) => return Err(e),
            };

            // 已经有主的块不再重复认领，目录树成环时也就不会无限递归
            let mut claimed = true;
            for id in &chain {
                match &survey.owners[id.raw()] {
                    Some(owner) => {
                        log::error!("{path:?} shares block {id} with {owner:?}");
                        survey.report.push(*id, Fault::CrossLinked);
                        claimed = false;
                    }
                    None => survey.owners[id.raw()] = Some(path.clone()),
                }
            }

            match ty {
                DirEntryType::Regular => {
                    if dirent.size() as usize > chain.len() * geometry.block_size() {
                        survey.report.push(head, Fault::BadEntry);
                    }
                }
                DirEntryType::Directory => {
                    if chain.len() != 1 {
                        survey.report.push(head, Fault::BadEntry);
                    }
                    if claimed {
                        self.survey_dir(head, &path, survey)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// 断掉的链表上能走到的块仍归这个目录项，免得再被报告为泄漏。
    fn claim_broken(&self, head: BlockId, path: &str, survey: &mut Survey) {
        let mut current = Some(head);
        while let Some(id) = current.filter(|id| self.geometry().contains(*id)) {
            if survey.owners[id.raw()].is_some() {
                break;
            }
            survey.owners[id.raw()] = Some(String::from(path));
            current = self.fat.next(id).ok().flatten();
        }
    }
}
