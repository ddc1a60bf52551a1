//! 解码器插件模块
//!
//! # 设计思路
//!
//! 插件机制由三部分组成：
//! - **契约**（`decoder`）：所有解码器必须实现的 `PixelDecoder` trait
//! - **注册表**（`registry`）：按名称去重、按优先级排序的解码器目录
//! - **解析器**（`resolver`）：对给定输入逐个探测，选出唯一解码器
//!
//! # 实现思路
//!
//! - 适用性依赖运行时内容（MIME 嗅探、运行环境、字节头），因此解析是
//!   “运行时有序扫描”，而不是编译期静态分发。
//! - 注册表是可注入对象（`Arc<DecoderRegistry>`），测试可构造互相隔离的实例。
//! - 单个解码器的探测失败只记录警告，不影响其它候选。

mod decoder;
mod registry;
mod resolver;
mod validate;

pub use decoder::{DecoderMetadata, PixelDecoder, SharedDecoder};
pub use registry::DecoderRegistry;
pub use resolver::{capable_decoders, resolve_decoder, run_decoder};
pub use validate::validate_decoder;
