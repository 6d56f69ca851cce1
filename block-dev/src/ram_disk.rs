use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use crate::{BlockDevice, BlockError};

/// 内存中的块设备，容量在创建时固定。
#[derive(Debug)]
pub struct RamDisk {
    data: Mutex<Vec<u8>>,
}

impl RamDisk {
    pub fn new(bytes: usize) -> Self {
        Self {
            data: Mutex::new(vec![0; bytes]),
        }
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 整个设备内容的拷贝
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    fn span(&self, block_id: usize, len: usize) -> Result<(usize, usize), BlockError> {
        let start = block_id.checked_mul(len).ok_or(BlockError::OutOfRange)?;
        let end = start.checked_add(len).ok_or(BlockError::OutOfRange)?;
        if end > self.len() {
            return Err(BlockError::OutOfRange);
        }
        Ok((start, end))
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), BlockError> {
        let (start, end) = self.span(block_id, buf.len())?;
        buf.copy_from_slice(&self.data.lock()[start..end]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), BlockError> {
        let (start, end) = self.span(block_id, buf.len())?;
        self.data.lock()[start..end].copy_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough() {
        let disk = RamDisk::new(16);
        disk.write_block(1, &[1, 2, 3, 4]).unwrap();

        let mut buf = [0; 4];
        disk.read_block(1, &mut buf).unwrap();
        assert_eq!([1u8, 2, 3, 4], buf);
        assert_eq!(&[0u8, 0, 0, 0, 1, 2, 3, 4], &disk.snapshot()[..8]);
    }

    #[test]
    fn out_of_range() {
        let disk = RamDisk::new(16);
        let mut buf = [0; 4];
        assert_eq!(Err(BlockError::OutOfRange), disk.read_block(4, &mut buf));
        assert_eq!(Err(BlockError::OutOfRange), disk.write_block(usize::MAX, &buf));
    }
}
