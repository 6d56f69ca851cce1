use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use block_dev::{BlockDevice, BlockError};
use send_wrapper::SendWrapper;

/// 以宿主机上的普通文件作为后备存储
#[derive(Debug)]
pub struct BlockFile {
    inner: SendWrapper<RefCell<File>>,
}

impl BlockFile {
    pub fn new(fd: File) -> Self {
        Self {
            inner: SendWrapper::new(RefCell::new(fd)),
        }
    }

    /// 定位到第`block_id`块，块大小为`len`。
    fn seek(file: &mut File, block_id: usize, len: usize) -> Result<(), BlockError> {
        let offset = (block_id * len) as u64;
        let size = file.metadata().map_err(device_error)?.len();
        if offset + len as u64 > size {
            return Err(BlockError::OutOfRange);
        }

        file.seek(SeekFrom::Start(offset)).map_err(device_error)?;
        Ok(())
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), BlockError> {
        let mut file = self.inner.borrow_mut();
        Self::seek(&mut file, block_id, buf.len())?;
        file.read_exact(buf).map_err(transfer_error)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), BlockError> {
        let mut file = self.inner.borrow_mut();
        Self::seek(&mut file, block_id, buf.len())?;
        file.write_all(buf).map_err(transfer_error)
    }
}

fn device_error(err: io::Error) -> BlockError {
    log::error!("image file: {err}");
    BlockError::Device
}

fn transfer_error(err: io::Error) -> BlockError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof | io::ErrorKind::WriteZero => {
            log::error!("image file: not a complete block");
            BlockError::ShortTransfer
        }
        _ => device_error(err),
    }
}
