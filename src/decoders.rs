//! # 默认解码器集合与自动加载
//!
//! ## 设计思路
//!
//! 根据运行时（平台 × 上下文）注册一组默认解码器：
//! - `bitmap`：已解码位图，所有环境可用
//! - `image`：`image` crate 原生解码，服务端可用
//! - `image-worker`：worker 上下文中把 `image` 的解码放进独立队列
//!
//! ## 实现思路
//!
//! - 注册按名称幂等，重复调用自动加载不会产生重复条目。
//! - `bootstrap` 是尽力而为的启动步骤：失败只记录 `error!`，不影响宿主进程。
//! - 原生解码器持有共享配置，之后的 `set_config` 对它立即生效；
//!   `image-worker` 的队列并发数与默认超时在注册时确定。

mod bitmap;
mod native;
mod queued;

use std::sync::Arc;

use crate::config::SharedConfig;
use crate::env::{Context, RuntimeEnv};
use crate::error::PixelError;
use crate::plugin::{DecoderRegistry, SharedDecoder};
use crate::queue::TaskQueue;

pub use bitmap::BitmapDecoder;
pub use native::ImageDecoder;
pub use queued::QueuedDecoder;

pub const WORKER_DECODER_NAME: &str = "image-worker";
pub const WORKER_DECODER_PRIORITY: i32 = 1100;

/// 当前运行时可用的默认解码器（未注册）。
pub fn default_decoders(env: RuntimeEnv, config: &SharedConfig) -> Result<Vec<SharedDecoder>, PixelError> {
    let snapshot = config.snapshot()?;
    let image: SharedDecoder = Arc::new(ImageDecoder::new(config.clone()));
    let bitmap: SharedDecoder = Arc::new(BitmapDecoder::new());
    let mut decoders = vec![bitmap, Arc::clone(&image)];

    if env.context == Context::Worker {
        let queue = TaskQueue::new(snapshot.queue_concurrency)?;
        let worker = QueuedDecoder::new(
            WORKER_DECODER_NAME,
            WORKER_DECODER_PRIORITY,
            image,
            queue,
            snapshot.decode_timeout(),
        )
        .with_contexts(vec![Context::Worker]);
        decoders.push(Arc::new(worker));
    }

    Ok(decoders
        .into_iter()
        .filter(|decoder| decoder.metadata().is_none_or(|metadata| metadata.supports(env)))
        .collect())
}

/// 探测当前运行时并注册默认解码器。配置中的 `context` 优先于线程探测。
pub fn autoload_decoders(registry: &DecoderRegistry, config: &SharedConfig) -> Result<(), PixelError> {
    let env = RuntimeEnv::detect_with(config.snapshot()?.context);
    autoload_for(registry, env, config)
}

/// 按指定运行时注册默认解码器。
pub fn autoload_for(
    registry: &DecoderRegistry,
    env: RuntimeEnv,
    config: &SharedConfig,
) -> Result<(), PixelError> {
    let mut added = 0;
    for decoder in default_decoders(env, config)? {
        if registry.define(decoder)? {
            added += 1;
        }
    }

    log::info!(
        "🔌 自动加载解码器 - 运行时: {} 新增: {} 共计: {}",
        env,
        added,
        registry.len()
    );
    Ok(())
}

/// 尽力而为的启动注册：失败只记录日志。
pub fn bootstrap(registry: &DecoderRegistry, config: &SharedConfig) {
    if let Err(err) = autoload_decoders(registry, config) {
        log::error!(
            "❌ 自动加载解码器失败: {} (code={}, stage={})",
            err,
            err.code(),
            err.stage()
        );
    }
}
