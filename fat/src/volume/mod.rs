//! 卷的布局
//!
//! FAT区 | 根目录 | 数据区

mod dir_entry;
mod fat;

pub use self::{
    dir_entry::{DIR_ENTRY_SIZE, DirEntry, DirEntryStatus, NAME_MAX, check_name},
    fat::Fat,
};
