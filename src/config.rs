//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `PixeliftConfig`，保证运行时行为可观测、可调整、可测试。
//! 字段覆盖加载（文件体积、网络超时、重定向）、解码（像素与内存上限）
//! 与调度（队列并发、任务超时）三个阶段。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的平衡配置。
//! - `validate` 在构造期拒绝非法参数，而不是拖到第一次使用。
//! - 支持从 JSON 字符串/文件加载（`serde_json`），缺省字段回落到默认值。
//! - [`SharedConfig`] 在服务与解码器之间共享同一份配置，每次请求开始时取快照，
//!   `set_config` 之后的请求立即使用新值。

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::env::Context;
use crate::error::PixelError;

/// 解码服务配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PixeliftConfig {
    /// 加载原始字节时允许的最大体积（字节）。
    pub max_file_size: u64,
    /// 网络下载总超时（秒）。
    pub download_timeout_secs: u64,
    /// 建立连接超时（秒）。
    pub connect_timeout_secs: u64,
    /// 最大重定向次数。
    pub max_redirects: usize,
    /// 解码后像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 解码队列并发数。
    pub queue_concurrency: usize,
    /// 队列任务默认超时（毫秒），`None` 表示不限时。
    pub decode_timeout_ms: Option<u64>,
    /// 是否通过队列调度解码。
    pub use_queue: bool,
    /// 本地文件输入必须位于该目录下；`None` 表示不限制。
    pub allowed_root: Option<PathBuf>,
    /// 自动加载时使用的运行上下文；`None` 表示按当前线程探测。
    pub context: Option<Context>,
}

impl Default for PixeliftConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            download_timeout_secs: 30,
            connect_timeout_secs: 8,
            max_redirects: 5,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            queue_concurrency: 2,
            decode_timeout_ms: Some(30_000),
            use_queue: true,
            allowed_root: None,
            context: None,
        }
    }
}

impl PixeliftConfig {
    /// 校验参数范围。
    pub fn validate(&self) -> Result<(), PixelError> {
        if self.max_file_size == 0 {
            return Err(PixelError::Config("max_file_size 必须大于 0".to_string()));
        }
        if !(1..=600).contains(&self.download_timeout_secs) {
            return Err(PixelError::Config(
                "download_timeout_secs 必须在 1~600 秒之间".to_string(),
            ));
        }
        if !(1..=120).contains(&self.connect_timeout_secs) {
            return Err(PixelError::Config(
                "connect_timeout_secs 必须在 1~120 秒之间".to_string(),
            ));
        }
        if self.connect_timeout_secs > self.download_timeout_secs {
            return Err(PixelError::Config(
                "connect_timeout_secs 不能大于 download_timeout_secs".to_string(),
            ));
        }
        if self.max_redirects > 20 {
            return Err(PixelError::Config("max_redirects 不能超过 20".to_string()));
        }
        if self.max_decoded_pixels == 0 {
            return Err(PixelError::Config("max_decoded_pixels 必须大于 0".to_string()));
        }
        if self.max_decoded_bytes < 1024 * 1024 {
            return Err(PixelError::Config("max_decoded_bytes 不能小于 1MB".to_string()));
        }
        if self.queue_concurrency < 1 {
            return Err(PixelError::Config(format!(
                "queue_concurrency 必须 >= 1（当前：{}）",
                self.queue_concurrency
            )));
        }
        if let Some(ms) = self.decode_timeout_ms {
            if !(1..=600_000).contains(&ms) {
                return Err(PixelError::Config(
                    "decode_timeout_ms 必须在 1~600000 毫秒之间".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// 从 JSON 字符串加载并校验。
    pub fn from_json_str(content: &str) -> Result<Self, PixelError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| PixelError::Config(format!("解析配置失败：{}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文件加载并校验。
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PixelError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PixelError::Config(format!("读取配置文件失败：{}（{}）", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn decode_timeout(&self) -> Option<Duration> {
        self.decode_timeout_ms.map(Duration::from_millis)
    }
}

/// 可在多个持有者之间共享、运行时可替换的配置。
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<PixeliftConfig>>,
}

impl SharedConfig {
    pub fn new(config: PixeliftConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// 当前配置快照，请求过程中不持锁。
    pub fn snapshot(&self) -> Result<PixeliftConfig, PixelError> {
        self.inner
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| PixelError::Internal("配置读取锁已中毒".to_string()))
    }

    /// 校验后替换配置；校验失败时保留旧值。
    pub fn replace(&self, config: PixeliftConfig) -> Result<(), PixelError> {
        config.validate()?;
        let mut guard = self
            .inner
            .write()
            .map_err(|_| PixelError::Internal("配置写入锁已中毒".to_string()))?;
        *guard = config;
        Ok(())
    }
}

impl From<PixeliftConfig> for SharedConfig {
    fn from(config: PixeliftConfig) -> Self {
        Self::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PixeliftConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = PixeliftConfig {
            queue_concurrency: 0,
            ..PixeliftConfig::default()
        };
        assert!(matches!(config.validate(), Err(PixelError::Config(_))));
    }

    #[test]
    fn connect_timeout_above_total_is_rejected() {
        let config = PixeliftConfig {
            connect_timeout_secs: 60,
            download_timeout_secs: 30,
            ..PixeliftConfig::default()
        };
        assert!(matches!(config.validate(), Err(PixelError::Config(_))));
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = PixeliftConfig::from_json_str(r#"{ "queue_concurrency": 4, "decode_timeout_ms": null }"#)
            .expect("partial json should load");

        assert_eq!(config.queue_concurrency, 4);
        assert_eq!(config.decode_timeout(), None);
        assert_eq!(config.max_file_size, PixeliftConfig::default().max_file_size);
    }

    #[test]
    fn json_with_invalid_values_is_rejected() {
        let result = PixeliftConfig::from_json_str(r#"{ "queue_concurrency": 0 }"#);
        assert!(matches!(result, Err(PixelError::Config(_))));
    }

    #[test]
    fn json_file_roundtrip() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("pixelift.json");
        let saved = PixeliftConfig {
            max_redirects: 2,
            use_queue: false,
            ..PixeliftConfig::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&saved).expect("serialize"))
            .expect("write config");

        let loaded = PixeliftConfig::from_json_file(&path).expect("load config");
        assert_eq!(loaded, saved);
    }

    #[test]
    fn json_context_override() {
        let config = PixeliftConfig::from_json_str(r#"{ "context": "main" }"#).expect("context json");
        assert_eq!(config.context, Some(Context::Main));
    }

    #[test]
    fn shared_config_clones_see_replacement() {
        let shared = SharedConfig::new(PixeliftConfig::default());
        let reader = shared.clone();

        shared
            .replace(PixeliftConfig {
                max_file_size: 10,
                ..PixeliftConfig::default()
            })
            .expect("valid config");
        assert_eq!(reader.snapshot().expect("snapshot").max_file_size, 10);

        let invalid = shared.replace(PixeliftConfig {
            max_file_size: 0,
            ..PixeliftConfig::default()
        });
        assert!(matches!(invalid, Err(PixelError::Config(_))));
        assert_eq!(reader.snapshot().expect("snapshot").max_file_size, 10);
    }
}
