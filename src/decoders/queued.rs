//! # 队列卸载解码器
//!
//! 包装另一个解码器，把它的 `decode` 放进独立的 [`TaskQueue`] 执行，
//! 限制并发并附加超时。探测与准备阶段直接委托给内部解码器。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::PixelError;
use crate::input::PixelInput;
use crate::options::DecodeOptions;
use crate::pixel::PixelData;
use crate::plugin::{DecoderMetadata, PixelDecoder, SharedDecoder};
use crate::queue::TaskQueue;

pub struct QueuedDecoder {
    name: String,
    priority: i32,
    inner: SharedDecoder,
    queue: TaskQueue,
    timeout: Option<Duration>,
    metadata: DecoderMetadata,
}

impl QueuedDecoder {
    pub fn new(
        name: impl Into<String>,
        priority: i32,
        inner: SharedDecoder,
        queue: TaskQueue,
        timeout: Option<Duration>,
    ) -> Self {
        let metadata = DecoderMetadata {
            description: Some(format!("经由任务队列执行 {}", inner.name())),
            ..inner.metadata().cloned().unwrap_or_default()
        };

        Self {
            name: name.into(),
            priority,
            inner,
            queue,
            timeout,
            metadata,
        }
    }

    /// 限定元数据中的运行上下文。
    pub fn with_contexts(mut self, contexts: Vec<crate::env::Context>) -> Self {
        self.metadata.contexts = contexts;
        self
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }
}

#[async_trait]
impl PixelDecoder for QueuedDecoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn metadata(&self) -> Option<&DecoderMetadata> {
        Some(&self.metadata)
    }

    async fn can_handle(&self, input: &PixelInput, options: &DecodeOptions) -> Result<bool, PixelError> {
        self.inner.can_handle(input, options).await
    }

    async fn prepare_for_decode(
        &self,
        input: PixelInput,
        options: &DecodeOptions,
    ) -> Result<PixelInput, PixelError> {
        self.inner.prepare_for_decode(input, options).await
    }

    async fn decode(&self, input: PixelInput, options: &DecodeOptions) -> Result<PixelData, PixelError> {
        let inner = Arc::clone(&self.inner);
        let task_options = options.clone();
        let timeout = options.timeout.or(self.timeout);

        self.queue
            .enqueue(
                move |signal| async move {
                    let mut task_options = task_options;
                    task_options.signal = Some(signal);
                    inner.decode(input, &task_options).await
                },
                options.signal.clone(),
                timeout,
            )
            .await
    }

    async fn dispose(&self) {
        log::info!(
            "🧹 释放队列解码器 {} - 运行中: {} 等待中: {}",
            self.name,
            self.queue.running(),
            self.queue.pending()
        );
        self.inner.dispose().await;
    }
}
