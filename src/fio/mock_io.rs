use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, error, trace};
use parking_lot::Mutex;

use crate::error::{E, R};
use crate::fio::{Fd, PosixIO};
use crate::options::Options;

/// 预设的单次 read 响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStep {
    /// 返回这些字节，buf 放不下时剩余部分留给下一次 read
    Data(Vec<u8>),

    /// 返回 0
    Eof,

    /// 返回错误，Interrupted 按 Options 的重试策略处理，和真实实现一致
    Fail(E),
}

impl ReadStep {
    pub fn data(bytes: impl AsRef<[u8]>) -> Self {
        ReadStep::Data(bytes.as_ref().to_vec())
    }
}

/// 调用记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Close { fd: Fd, result: R<()> },
    Read { fd: Fd, requested: usize, result: R<usize> },
}

impl Call {
    pub fn fd(&self) -> Fd {
        match self {
            Call::Close { fd, .. } | Call::Read { fd, .. } => *fd,
        }
    }
}

/// 带游标的文件内容，模拟真实描述符的读位置
#[derive(Debug, Default)]
struct Stream {
    content: Vec<u8>,
    cursor: usize,
    max_chunk: Option<usize>,
}

#[derive(Debug, Default)]
struct State {
    scripts: HashMap<Fd, VecDeque<ReadStep>>,
    streams: HashMap<Fd, Stream>,
    known: HashSet<Fd>,
    closed: HashSet<Fd>,

    // key 是从 1 开始的调用序号，所有描述符共用一个计数
    read_failures: HashMap<usize, E>,
    close_failures: HashMap<usize, E>,
    reads: usize,
    closes: usize,
    retries: usize,

    calls: Vec<Call>,
}

impl State {
    /// 标记 fd 为打开状态，关闭后被复用的 fd 丢弃上一次留下的脚本和内容
    fn open(&mut self, fd: Fd) {
        self.known.insert(fd);
        if self.closed.remove(&fd) {
            self.scripts.remove(&fd);
            self.streams.remove(&fd);
        }
    }

    /// 记一次中断，返回是否继续重试
    fn interrupt(&mut self, options: &Options, interrupted: &mut usize, fd: Fd) -> bool {
        *interrupted += 1;
        if !options.should_retry(*interrupted) {
            return false;
        }
        self.retries += 1;
        trace!("read on fd {} interrupted, retry #{}", fd, *interrupted);
        true
    }

    fn next_read(
        &mut self,
        fd: Fd,
        buf: &mut [u8],
        options: &Options,
        interrupted: &mut usize,
    ) -> R<usize> {
        if self.closed.contains(&fd) {
            return Err(E::InvalidDescriptor(fd));
        }

        while let Some(step) = self.scripts.get_mut(&fd).and_then(|s| s.pop_front()) {
            match step {
                ReadStep::Data(mut bytes) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    if n < bytes.len() {
                        let rest = ReadStep::Data(bytes.split_off(n));
                        self.scripts.entry(fd).or_default().push_front(rest);
                    }
                    return Ok(n);
                }
                ReadStep::Eof => return Ok(0),
                ReadStep::Fail(E::Interrupted) => {
                    if !self.interrupt(options, interrupted, fd) {
                        return Err(E::Interrupted);
                    }
                }
                ReadStep::Fail(e) => return Err(e),
            }
        }

        if let Some(stream) = self.streams.get_mut(&fd) {
            let remaining = stream.content.len() - stream.cursor;
            let mut n = remaining.min(buf.len());
            if let Some(max) = stream.max_chunk {
                n = n.min(max);
            }
            buf[..n].copy_from_slice(&stream.content[stream.cursor..stream.cursor + n]);
            stream.cursor += n;
            return Ok(n);
        }

        if self.known.contains(&fd) {
            return Ok(0);
        }
        Err(E::InvalidDescriptor(fd))
    }
}

/// 测试用的 IO 实现：预设 read 的返回、在第 N 次调用上注入错误、记录所有调用。
///
/// 内部状态由一把锁保护，可以在多个线程间共享。
#[derive(Debug, Default)]
pub struct MockIO {
    options: Options,
    state: Mutex<State>,
}

impl MockIO {
    pub fn new() -> Self {
        Self::default()
    }

    /// 中断重试和失败日志遵循 options，与 SysIO 相同
    pub fn with_options(options: Options) -> Self {
        Self {
            options,
            state: Mutex::default(),
        }
    }

    fn log_failure<T>(&self, op: &str, fd: Fd, result: &R<T>) {
        if let Err(e) = result {
            if self.options.log_failures {
                error!("{} on fd {} failed: {}", op, fd, e);
            }
        }
    }

    /// 在 fd 的脚本末尾追加一次 read 响应
    pub fn push_read(&self, fd: Fd, step: ReadStep) {
        let mut state = self.state.lock();
        state.open(fd);
        state.scripts.entry(fd).or_default().push_back(step);
    }

    pub fn push_reads(&self, fd: Fd, steps: impl IntoIterator<Item = ReadStep>) {
        let mut state = self.state.lock();
        state.open(fd);
        state.scripts.entry(fd).or_default().extend(steps);
    }

    /// 给 fd 设置完整的文件内容，游标归零。脚本用完之后从这里读
    pub fn set_content(&self, fd: Fd, content: Vec<u8>) {
        let mut state = self.state.lock();
        state.open(fd);
        let stream = state.streams.entry(fd).or_default();
        stream.content = content;
        stream.cursor = 0;
    }

    /// 限制 fd 每次 read 最多返回的字节数，用来制造短读
    pub fn set_max_chunk(&self, fd: Fd, max_chunk: usize) {
        let mut state = self.state.lock();
        state.open(fd);
        state.streams.entry(fd).or_default().max_chunk = Some(max_chunk);
    }

    /// 第 call 次 read（从 1 开始，跨所有描述符计数）返回 e。
    ///
    /// buf 为空的 read 也占一个序号，但总是返回 Ok(0)；落在这种调用上的错误会被丢弃并打 debug 日志
    pub fn fail_read_on_call(&self, call: usize, e: E) {
        self.state.lock().read_failures.insert(call, e);
    }

    /// 第 call 次 close（从 1 开始，跨所有描述符计数）返回 e，描述符保持打开
    pub fn fail_close_on_call(&self, call: usize, e: E) {
        self.state.lock().close_failures.insert(call, e);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn close_count(&self, fd: Fd) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Close { fd: f, .. } if *f == fd))
            .count()
    }

    pub fn was_closed(&self, fd: Fd) -> bool {
        self.close_count(fd) > 0
    }

    pub fn read_count(&self, fd: Fd) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Read { fd: f, .. } if *f == fd))
            .count()
    }

    /// 被吞掉的 Interrupted 次数
    pub fn retries(&self) -> usize {
        self.state.lock().retries
    }

    pub fn reset(&self) {
        *self.state.lock() = State::default();
    }
}

impl PosixIO for MockIO {
    fn close(&self, fd: Fd) -> R<()> {
        let mut state = self.state.lock();
        state.closes += 1;
        let call = state.closes;

        let result = if let Some(e) = state.close_failures.remove(&call) {
            debug!("injecting {:?} into close #{} on fd {}", e, call, fd);
            Err(e)
        } else if !state.closed.insert(fd) {
            Err(E::InvalidDescriptor(fd))
        } else {
            Ok(())
        };

        state.calls.push(Call::Close {
            fd,
            result: result.clone(),
        });
        self.log_failure("close", fd, &result);
        result
    }

    fn read(&self, fd: Fd, buf: &mut [u8]) -> R<usize> {
        let mut state = self.state.lock();
        state.reads += 1;
        let call = state.reads;

        let mut interrupted = 0;
        let forced = state.read_failures.remove(&call);
        let result = match forced {
            Some(e) if buf.is_empty() => {
                debug!("dropping {:?} for read #{} on fd {}: empty buffer", e, call, fd);
                Ok(0)
            }
            _ if buf.is_empty() => Ok(0),
            Some(E::Interrupted) => {
                if state.interrupt(&self.options, &mut interrupted, fd) {
                    state.next_read(fd, buf, &self.options, &mut interrupted)
                } else {
                    Err(E::Interrupted)
                }
            }
            Some(e) => {
                debug!("injecting {:?} into read #{} on fd {}", e, call, fd);
                Err(e)
            }
            None => state.next_read(fd, buf, &self.options, &mut interrupted),
        };

        state.calls.push(Call::Read {
            fd,
            requested: buf.len(),
            result: result.clone(),
        });
        self.log_failure("read", fd, &result);
        result
    }
}
