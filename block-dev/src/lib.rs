//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 文件系统只通过块设备驱动读写后备存储，块的大小由调用方决定，
//! 驱动只负责把`block_id * buf.len()`处的一整块搬进搬出。

#![no_std]

extern crate alloc;

mod ram_disk;

use core::any::Any;

use derive_more::Display;

pub use self::ram_disk::RamDisk;

/// 块设备驱动特质
pub trait BlockDevice: Send + Sync + Any {
    /// 读取第`block_id`块，块大小为`buf.len()`。
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), BlockError>;

    /// 写入第`block_id`块，块大小为`buf.len()`。
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), BlockError>;
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum BlockError {
    /// 块编号超出设备容量
    #[display(fmt = "block out of range")]
    OutOfRange,
    /// 设备只传输了部分数据
    #[display(fmt = "not a complete block")]
    ShortTransfer,
    /// 设备本身报告的错误
    #[display(fmt = "device failure")]
    Device,
}

impl core::error::Error for BlockError {}
