//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 使用单一错误枚举 `PixelError` 承载解码链路中的所有错误来源，
//! 替代字符串拼接式错误处理。调用方需要能区分四类失败：
//! “没有解码器能处理”、“解码器尝试了但失败”、“超时”、“被取消”。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - `kind()` 给出程序化分类（[`ErrorKind`]），不依赖消息文本。
//! - `code()` / `stage()` 提供稳定错误码与阶段标识，便于日志与上层映射。

use std::io;

/// 错误分类，用于程序化区分失败类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 没有任何已注册解码器声明可以处理该输入。
    Resolution,
    /// 已选定解码器，但加载/准备/解码阶段失败。
    DecodeFailure,
    /// 队列任务超过截止时间。
    Timeout,
    /// 任务被取消信号中止。
    Cancelled,
    /// 构造期配置非法。
    Configuration,
}

/// 解码链路统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum PixelError {
    #[error("没有可处理该输入的解码器，输入类型：{input_kind}")]
    NoSuitableDecoder { input_kind: &'static str },

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("网络错误：{0}")]
    Network(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("任务超时：超过 {after_ms}ms 未完成")]
    Timeout { after_ms: u64 },

    #[error("任务已取消")]
    Cancelled,

    #[error("配置错误：{0}")]
    Config(String),

    #[error("内部错误：{0}")]
    Internal(String),
}

impl PixelError {
    /// 错误所属分类。
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSuitableDecoder { .. } => ErrorKind::Resolution,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Config(_) => ErrorKind::Configuration,
            Self::Decode(_)
            | Self::InvalidFormat(_)
            | Self::Network(_)
            | Self::FileSystem(_)
            | Self::ResourceLimit(_)
            | Self::Internal(_) => ErrorKind::DecodeFailure,
        }
    }

    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSuitableDecoder { .. } => "E_NO_DECODER",
            Self::Decode(_) => "E_DECODE",
            Self::InvalidFormat(_) => "E_INVALID_FORMAT",
            Self::Network(_) => "E_NETWORK",
            Self::FileSystem(_) => "E_FILE_SYSTEM",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
            Self::Timeout { .. } => "E_TIMEOUT",
            Self::Cancelled => "E_CANCELLED",
            Self::Config(_) => "E_CONFIG",
            Self::Internal(_) => "E_INTERNAL",
        }
    }

    /// 错误发生的链路阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::NoSuitableDecoder { .. } => "resolve",
            Self::Network(_) | Self::FileSystem(_) => "load",
            Self::Decode(_) | Self::InvalidFormat(_) | Self::ResourceLimit(_) => "decode",
            Self::Timeout { .. } | Self::Cancelled => "queue",
            Self::Config(_) => "config",
            Self::Internal(_) => "runtime",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<io::Error> for PixelError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::FileSystem(format!("文件不存在：{}", error)),
            io::ErrorKind::PermissionDenied => Self::FileSystem(format!("没有访问权限：{}", error)),
            _ => Self::FileSystem(error.to_string()),
        }
    }
}

impl From<PixelError> for String {
    fn from(error: PixelError) -> Self {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_separate_the_four_failure_buckets() {
        let resolution = PixelError::NoSuitableDecoder { input_kind: "bytes" };
        let decode = PixelError::Decode("broken".to_string());
        let timeout = PixelError::Timeout { after_ms: 10 };
        let cancelled = PixelError::Cancelled;

        assert_eq!(resolution.kind(), ErrorKind::Resolution);
        assert_eq!(decode.kind(), ErrorKind::DecodeFailure);
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert_eq!(cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(PixelError::Config("x".into()).kind(), ErrorKind::Configuration);
    }

    #[test]
    fn resolution_message_names_input_kind() {
        let err = PixelError::NoSuitableDecoder { input_kind: "bitmap" };
        assert!(err.to_string().contains("bitmap"));
        assert_eq!(err.code(), "E_NO_DECODER");
        assert_eq!(err.stage(), "resolve");
    }

    #[test]
    fn io_not_found_maps_to_file_system() {
        let err: PixelError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, PixelError::FileSystem(_)));
        assert_eq!(err.stage(), "load");
    }
}
