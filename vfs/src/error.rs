use block_dev::BlockError;
use derive_more::Display;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 路径中的某个分量不存在
    #[display(fmt = "no such file or directory")]
    NotFound,
    /// 路径中间的分量是文件
    #[display(fmt = "not a directory")]
    NotADirectory,
    /// 期望文件，得到的却是目录
    #[display(fmt = "is a directory")]
    IsADirectory,
    #[display(fmt = "name already exists in directory")]
    DuplicateName,
    /// 目录块的槽位全部被占用
    #[display(fmt = "directory is full")]
    DirectoryFull,
    #[display(fmt = "not enough free blocks")]
    OutOfSpace,
    #[display(fmt = "path component too long")]
    NameTooLong,
    #[display(fmt = "invalid path")]
    InvalidPath,
    #[display(fmt = "directory not empty")]
    DirectoryNotEmpty,
    #[display(fmt = "invalid argument")]
    InvalidArgument,
    /// FAT或目录树违反了不变式，例如链表成环
    #[display(fmt = "filesystem is corrupted")]
    Corrupted,
    #[display(fmt = "I/O error: {}", _0)]
    Io(BlockError),
}

impl From<BlockError> for Error {
    fn from(err: BlockError) -> Self {
        Self::Io(err)
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}
