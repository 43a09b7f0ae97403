use std::io;

use log::{debug, error};

use crate::error::{E, R};
use crate::fio::{Fd, PosixIO};
use crate::options::Options;

/// 直接转发给 libc 的 close / read，本身不持有任何描述符状态
#[derive(Debug, Default)]
pub struct SysIO {
    options: Options,
}

impl SysIO {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    fn fail(&self, op: &str, fd: Fd, errno: i32) -> E {
        let e = E::from_errno(fd, errno);
        if self.options.log_failures {
            error!("{} on fd {} failed: {}", op, fd, e);
        }
        e
    }
}

fn last_errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO)
}

impl PosixIO for SysIO {
    fn close(&self, fd: Fd) -> R<()> {
        // EINTR 之后描述符状态未定义，不能重试
        let ret = unsafe { libc::close(fd) };
        if ret == 0 {
            return Ok(());
        }
        Err(self.fail("close", fd, last_errno()))
    }

    fn read(&self, fd: Fd, buf: &mut [u8]) -> R<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut interrupted = 0;
        loop {
            let ret = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if ret >= 0 {
                return Ok(ret as usize);
            }

            let errno = last_errno();
            if errno == libc::EINTR {
                interrupted += 1;
                if self.options.should_retry(interrupted) {
                    debug!("read on fd {} interrupted, retry #{}", fd, interrupted);
                    continue;
                }
            }
            return Err(self.fail("read", fd, errno));
        }
    }
}
