//! 单次解码请求的选项。

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// 单次解码请求选项。
///
/// `signal` 会被传递到加载、队列与解码各个异步边界；取消是协作式的。
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// 显式指定解码器名称；无法处理时回退到自动选择。
    pub decoder: Option<String>,
    /// 取消信号。
    pub signal: Option<CancellationToken>,
    /// 输入的 MIME 类型提示。
    pub mime_type: Option<String>,
    /// 队列任务超时；未设置时使用配置中的默认值。
    pub timeout: Option<Duration>,
    /// 远程加载时附加的请求头。
    pub headers: Vec<(String, String)>,
    /// 动图（GIF）帧索引。
    pub frame: u32,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decoder(mut self, name: impl Into<String>) -> Self {
        self.decoder = Some(name.into());
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_frame(mut self, frame: u32) -> Self {
        self.frame = frame;
        self
    }

    /// 信号是否已触发。
    pub fn is_cancelled(&self) -> bool {
        self.signal.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// 等待取消；无信号时永不完成，便于放进 `tokio::select!`。
    pub async fn cancelled(&self) {
        match &self.signal {
            Some(signal) => signal.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    }
}
