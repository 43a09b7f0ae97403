pub mod mock_io;
pub mod sys_io;

use std::sync::Arc;

use log::trace;

use crate::error::R;
use crate::options::Options;

/// 文件描述符，由调用方持有，IO 层从不创建、保存或主动关闭
pub type Fd = std::os::unix::io::RawFd;

/// IO 层接口，对应 POSIX 的 close 和 read
pub trait PosixIO: Send + Sync {
    /// 关闭文件描述符，不会重试
    fn close(&self, fd: Fd) -> R<()>;

    /// 从文件描述符当前位置读取最多 buf.len() 个字节，返回读取到的字节数，0 表示 EOF。
    /// 允许短读，只写入 buf 的前 n 个字节
    fn read(&self, fd: Fd, buf: &mut [u8]) -> R<usize>;

    /// 反复 read 直到 buf 填满或遇到 EOF，返回总共读取的字节数
    fn read_full(&self, fd: Fd, buf: &mut [u8]) -> R<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(fd, &mut buf[filled..])?;
            if n == 0 {
                trace!("fd {} hit eof after {} of {} bytes", fd, filled, buf.len());
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

impl<T: PosixIO + ?Sized> PosixIO for Arc<T> {
    fn close(&self, fd: Fd) -> R<()> {
        (**self).close(fd)
    }

    fn read(&self, fd: Fd, buf: &mut [u8]) -> R<usize> {
        (**self).read(fd, buf)
    }
}

impl<T: PosixIO + ?Sized> PosixIO for Box<T> {
    fn close(&self, fd: Fd) -> R<()> {
        (**self).close(fd)
    }

    fn read(&self, fd: Fd, buf: &mut [u8]) -> R<usize> {
        (**self).read(fd, buf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IOType {
    /// 真实的系统调用
    Sys,

    /// 测试用的 mock
    Mock,
}

pub fn new_io_manager(io_type: IOType, options: Options) -> Box<dyn PosixIO> {
    match io_type {
        IOType::Sys => Box::new(sys_io::SysIO::new(options)),
        IOType::Mock => Box::new(mock_io::MockIO::with_options(options)),
    }
}

#[cfg(test)]
mod tests {
    use super::mock_io::{MockIO, ReadStep};
    use super::*;

    #[test]
    fn test_read_full_over_short_reads() {
        let mock = MockIO::new();
        mock.push_read(3, ReadStep::data("he"));
        mock.push_read(3, ReadStep::data("llo"));
        mock.push_read(3, ReadStep::Eof);

        let mut buf = [0u8; 8];
        let n = mock.read_full(3, &mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(mock.read_count(3), 3);
    }

    #[test]
    fn test_read_full_stops_when_buffer_full() {
        let mock = MockIO::new();
        mock.set_content(4, b"abcdef".to_vec());
        mock.set_max_chunk(4, 2);

        let mut buf = [0u8; 4];
        assert_eq!(mock.read_full(4, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(mock.read_count(4), 2);
    }

    #[test]
    fn test_read_full_propagates_error() {
        let mock = MockIO::new();
        mock.push_read(5, ReadStep::data("ab"));
        mock.push_read(5, ReadStep::Fail(crate::error::E::IOFailure(5)));

        let mut buf = [0u8; 4];
        assert_eq!(
            mock.read_full(5, &mut buf),
            Err(crate::error::E::IOFailure(5))
        );
    }

    #[test]
    fn test_shared_handle_through_arc() {
        let mock = Arc::new(MockIO::new());
        let engine_side: Box<dyn PosixIO> = Box::new(Arc::clone(&mock));
        engine_side.close(11).unwrap();
        assert_eq!(mock.close_count(11), 1);
    }

    #[test]
    fn test_new_io_manager() {
        let mock = new_io_manager(IOType::Mock, Options::default());
        let mut buf = [0u8; 1];
        assert_eq!(
            mock.read(42, &mut buf),
            Err(crate::error::E::InvalidDescriptor(42))
        );

        let mock = new_io_manager(
            IOType::Mock,
            Options {
                log_failures: false,
                ..Default::default()
            },
        );
        assert_eq!(mock.close(42), Ok(()));
        assert_eq!(mock.close(42), Err(crate::error::E::InvalidDescriptor(42)));

        let sys = new_io_manager(IOType::Sys, Options::default());
        assert_eq!(sys.read(-1, &mut buf), Err(crate::error::E::InvalidDescriptor(-1)));
    }
}
