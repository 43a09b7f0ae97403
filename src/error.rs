use thiserror::Error;

use crate::fio::Fd;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum E {
    #[error("bad file descriptor {0}")]
    InvalidDescriptor(Fd),

    #[error("interrupted system call")]
    Interrupted,

    #[error("i/o failure on file descriptor {0}")]
    IOFailure(Fd),

    #[error("operation on file descriptor {fd} failed with errno {errno}")]
    Os { fd: Fd, errno: i32 },
}

impl E {
    /// 将系统调用返回的 errno 归类
    pub fn from_errno(fd: Fd, errno: i32) -> Self {
        match errno {
            libc::EBADF => E::InvalidDescriptor(fd),
            libc::EINTR => E::Interrupted,
            libc::EIO => E::IOFailure(fd),
            _ => E::Os { fd, errno },
        }
    }

    /// 对应的 POSIX errno，给习惯检查 errno 的调用方使用
    pub fn errno(&self) -> i32 {
        match self {
            E::InvalidDescriptor(_) => libc::EBADF,
            E::Interrupted => libc::EINTR,
            E::IOFailure(_) => libc::EIO,
            E::Os { errno, .. } => *errno,
        }
    }
}

pub type R<T> = Result<T, E>;
