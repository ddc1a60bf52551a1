//! # pixelift：可插拔图片解码门面
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  调用方：decode(input, options) -> PixelData (RGBA)       │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↓
//! ┌───────┼──────────────────────────────────────────────────┐
//! │  service ──── Pixelift（注册表 + 队列 + 配置快照）         │
//! │       │                                                  │
//! │       ├─ plugin::resolver  显式指定 → 优先级扫描 → 落空报错 │
//! │       ├─ plugin::registry  按名称去重、稳定优先级排序       │
//! │       └─ queue            有界并发 + 超时 + 取消           │
//! │                                                          │
//! │  decoders（默认解码器集合，按运行时自动加载）              │
//! │   ├─ bitmap        已解码位图 → RGBA                      │
//! │   ├─ image         image crate 原生解码                   │
//! │   └─ image-worker  worker 上下文中经队列执行 image         │
//! │                                                          │
//! │  loader ── format ── input ── pixel ── env                │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `PixelError`，区分解析失败、解码失败、超时、取消 |
//! | [`plugin`] | 解码器契约、注册表、解析器 |
//! | [`queue`] | 有界并发任务队列 |
//! | [`decoders`] | 默认解码器与自动加载 |
//! | [`service`] | 对外门面 `Pixelift` |
//! | [`loader`] | URL / 文件 / Data URL 字节加载与校验 |
//! | [`format`] | 文件签名识别 |
//! | [`input`] | 输入来源模型 |
//! | [`pixel`] | RGBA 结果模型 |
//! | [`options`] | 单次请求选项 |
//! | [`config`] | 可调策略与校验 |
//! | [`env`] | 运行时探测 |
//! | [`logging`] | `env_logger` 初始化 |

pub mod config;
pub mod decoders;
pub mod env;
pub mod error;
pub mod format;
pub mod input;
pub mod loader;
pub mod logging;
pub mod options;
pub mod pixel;
pub mod plugin;
pub mod queue;
pub mod service;

pub use config::{PixeliftConfig, SharedConfig};
pub use decoders::{autoload_decoders, autoload_for, bootstrap, default_decoders};
pub use env::{Context, Platform, RuntimeEnv};
pub use error::{ErrorKind, PixelError};
pub use input::{BitmapLayout, PixelInput, RawBitmap};
pub use options::DecodeOptions;
pub use pixel::PixelData;
pub use plugin::{
    DecoderMetadata, DecoderRegistry, PixelDecoder, SharedDecoder, capable_decoders, resolve_decoder, run_decoder,
};
pub use queue::TaskQueue;
pub use service::Pixelift;

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
