//! # 服务门面（可注入状态）
//!
//! ## 设计思路
//!
//! `Pixelift` 持有注册表、任务队列与配置，对外只暴露少量稳定 API：
//! - `decode`：解析解码器 → （经队列）准备输入 → 解码
//! - `resolve`：只做解析，不解码
//! - `set_config` / `config`：运行时切换配置
//! - `shutdown`：释放所有解码器资源
//!
//! ## 实现思路
//!
//! - 注册表通过 `Arc` 注入，测试可以构造互相隔离的实例。
//! - 配置放在 [`SharedConfig`] 中并与自动加载的解码器共享，每次请求开始时取快照，
//!   请求过程中不持锁。
//! - 队列并发数变化时替换队列；已入队任务继续在旧队列上完成。

use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::config::{PixeliftConfig, SharedConfig};
use crate::decoders::bootstrap;
use crate::error::PixelError;
use crate::input::PixelInput;
use crate::options::DecodeOptions;
use crate::pixel::PixelData;
use crate::plugin::{DecoderRegistry, SharedDecoder, resolve_decoder, run_decoder};
use crate::queue::TaskQueue;

pub struct Pixelift {
    registry: Arc<DecoderRegistry>,
    queue: RwLock<TaskQueue>,
    config: SharedConfig,
}

impl Pixelift {
    /// 使用新的注册表创建服务，并按当前运行时注册默认解码器。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use pixelift::{DecodeOptions, Pixelift, PixeliftConfig};
    ///
    /// # async fn demo() -> Result<(), pixelift::PixelError> {
    /// let service = Pixelift::new(PixeliftConfig::default())?;
    /// let pixels = service.decode("./photo.png", DecodeOptions::default()).await?;
    /// assert_eq!(pixels.data.len(), (pixels.width * pixels.height * 4) as usize);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: PixeliftConfig) -> Result<Self, PixelError> {
        config.validate()?;
        let registry = Arc::new(DecoderRegistry::new());
        let shared = SharedConfig::new(config);
        bootstrap(&registry, &shared);
        Self::with_shared_config(registry, shared)
    }

    /// 使用调用方提供的注册表创建服务，不做自动加载。
    pub fn with_registry(registry: Arc<DecoderRegistry>, config: PixeliftConfig) -> Result<Self, PixelError> {
        config.validate()?;
        Self::with_shared_config(registry, SharedConfig::new(config))
    }

    /// 与调用方（例如自行构造的解码器）共享同一份配置。
    pub fn with_shared_config(registry: Arc<DecoderRegistry>, config: SharedConfig) -> Result<Self, PixelError> {
        let snapshot = config.snapshot()?;
        snapshot.validate()?;
        let queue = TaskQueue::new(snapshot.queue_concurrency)?;

        Ok(Self {
            registry,
            queue: RwLock::new(queue),
            config,
        })
    }

    pub fn registry(&self) -> &Arc<DecoderRegistry> {
        &self.registry
    }

    /// 当前配置快照。
    pub fn config(&self) -> Result<PixeliftConfig, PixelError> {
        self.config.snapshot()
    }

    /// 服务与默认解码器共用的配置句柄。
    pub fn shared_config(&self) -> &SharedConfig {
        &self.config
    }

    /// 切换配置。之后发起的请求（包括默认解码器的加载与解码上限）使用新值。
    pub fn set_config(&self, config: PixeliftConfig) -> Result<(), PixelError> {
        config.validate()?;

        {
            let mut queue = self
                .queue
                .write()
                .map_err(|_| PixelError::Internal("队列锁已中毒".to_string()))?;
            if queue.concurrency() != config.queue_concurrency {
                *queue = TaskQueue::new(config.queue_concurrency)?;
            }
        }

        let (concurrency, use_queue) = (config.queue_concurrency, config.use_queue);
        self.config.replace(config)?;

        log::info!(
            "⚙️ 配置已更新 - 队列并发: {} 使用队列: {}",
            concurrency,
            use_queue
        );
        Ok(())
    }

    /// 当前解码队列句柄。
    pub fn queue(&self) -> Result<TaskQueue, PixelError> {
        self.queue
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| PixelError::Internal("队列锁已中毒".to_string()))
    }

    /// 只解析解码器，不解码。
    pub async fn resolve(&self, input: &PixelInput, options: &DecodeOptions) -> Result<SharedDecoder, PixelError> {
        resolve_decoder(&self.registry, input, options).await
    }

    /// 解码为 RGBA。
    pub async fn decode(
        &self,
        input: impl Into<PixelInput>,
        options: DecodeOptions,
    ) -> Result<PixelData, PixelError> {
        let total_start = Instant::now();
        let input = input.into();
        let input_kind = input.kind();

        let config = self.config()?;
        let queue = self.queue()?;

        let resolve_start = Instant::now();
        let decoder = resolve_decoder(&self.registry, &input, &options).await?;
        log::info!(
            "🎯 选定解码器 {} - 输入: {} 耗时: {:?}",
            decoder.name(),
            input_kind,
            resolve_start.elapsed()
        );

        let decode_start = Instant::now();
        let result = if config.use_queue {
            let timeout = options.timeout.or(config.decode_timeout());
            let signal = options.signal.clone();
            let task_decoder = Arc::clone(&decoder);

            queue
                .enqueue(
                    move |token| async move {
                        let mut options = options;
                        options.signal = Some(token);
                        run_decoder(&task_decoder, input, &options).await
                    },
                    signal,
                    timeout,
                )
                .await
        } else {
            run_decoder(&decoder, input, &options).await
        };

        let pixels = match result {
            Ok(pixels) => pixels,
            Err(err) => {
                log::warn!(
                    "❌ 解码失败 - 解码器: {} 输入: {} 错误: {} (code={}, stage={})",
                    decoder.name(),
                    input_kind,
                    err,
                    err.code(),
                    err.stage()
                );
                return Err(err);
            }
        };

        log::info!(
            "✅ 解码完成 - 解码器: {} 尺寸: {}x{} 解码耗时: {:?} 总耗时: {:?}",
            decoder.name(),
            pixels.width,
            pixels.height,
            decode_start.elapsed(),
            total_start.elapsed()
        );

        Ok(pixels)
    }

    /// 指定解码器解码；无法处理时按常规规则回退。
    pub async fn decode_with_decoder(
        &self,
        input: impl Into<PixelInput>,
        decoder: impl Into<String>,
        options: DecodeOptions,
    ) -> Result<PixelData, PixelError> {
        self.decode(input, options.with_decoder(decoder)).await
    }

    /// 释放所有解码器资源。
    pub async fn shutdown(&self) {
        log::info!("🛑 关闭解码服务 - 解码器数量: {}", self.registry.len());
        self.registry.dispose_all().await;
    }
}

impl std::fmt::Debug for Pixelift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pixelift")
            .field("registry", &self.registry)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
