#[derive(Debug, Clone)]
pub struct Options {
    /// read 遇到 EINTR 时自动重试
    pub retry_on_interrupt: bool,

    /// 连续重试次数上限，None 表示不限
    pub max_interrupt_retries: Option<usize>,

    /// 失败时打 error 日志
    pub log_failures: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            retry_on_interrupt: true,
            max_interrupt_retries: None,
            log_failures: true,
        }
    }
}

impl Options {
    /// 第 attempt 次被中断后是否还应该重试（attempt 从 1 开始）
    pub(crate) fn should_retry(&self, attempt: usize) -> bool {
        if !self.retry_on_interrupt {
            return false;
        }
        match self.max_interrupt_retries {
            Some(max) => attempt <= max,
            None => true,
        }
    }
}
