//! 持久化缓存使用的底层 IO 接口，只转发 POSIX 的 close 和 read，
//! 方便在测试里替换成可控的 mock。

pub mod error;
pub mod fio;
pub mod options;

pub use error::{E, R};
pub use fio::mock_io::{Call, MockIO, ReadStep};
pub use fio::sys_io::SysIO;
pub use fio::{new_io_manager, Fd, IOType, PosixIO};
pub use options::Options;
