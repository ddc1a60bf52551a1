//! # 格式识别
//!
//! 通过文件签名（magic bytes）识别图片格式。`image::guess_format` 决定
//! 原生解码器能否处理，`infer` 用于区分“不是图片”与“未知图片格式”，
//! 以及给出更准确的 MIME 类型。

use image::ImageFormat;

use crate::error::PixelError;

/// 签名识别结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedFormat {
    pub format: ImageFormat,
    pub mime_type: &'static str,
}

/// 识别原生解码器支持的图片格式；未知或非图片返回 `None`。
pub fn detect(bytes: &[u8]) -> Option<DetectedFormat> {
    let format = image::guess_format(bytes).ok()?;

    let mime_type = infer::get(bytes)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .map(|kind| kind.mime_type())
        .unwrap_or_else(|| format.to_mime_type());

    Some(DetectedFormat { format, mime_type })
}

/// `image/*` 类型判断，忽略大小写与参数。
pub fn is_image_mime(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|base| base.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false)
}

/// 完整字节的签名校验：空内容、非图片签名、无法识别都会被拒绝。
pub fn validate_image_signature(bytes: &[u8]) -> Result<(), PixelError> {
    if bytes.is_empty() {
        return Err(PixelError::InvalidFormat("图片内容为空".to_string()));
    }

    if let Some(kind) = infer::get(bytes) {
        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(PixelError::InvalidFormat(format!(
                "文件签名不是图片类型：{}",
                kind.mime_type()
            )));
        }
        return Ok(());
    }

    if image::guess_format(bytes).is_ok() {
        return Ok(());
    }

    Err(PixelError::InvalidFormat("无法识别图片类型".to_string()))
}

/// 流式下载阶段的签名探测。
///
/// - `Ok(true)`：已识别为图片
/// - `Ok(false)`：字节不足，继续读取
/// - `Err(..)`：已识别为非图片，或达到探测上限仍无法识别
pub fn probe_signature(bytes: &[u8], probe_limit: usize) -> Result<bool, PixelError> {
    if bytes.is_empty() {
        return Ok(false);
    }

    if let Some(kind) = infer::get(bytes) {
        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(PixelError::InvalidFormat(format!(
                "下载内容不是图片类型：{}",
                kind.mime_type()
            )));
        }
        return Ok(true);
    }

    if image::guess_format(bytes).is_ok() {
        return Ok(true);
    }

    if bytes.len() >= probe_limit {
        return Err(PixelError::InvalidFormat(format!(
            "前 {} 字节内无法识别图片类型",
            probe_limit
        )));
    }

    Ok(false)
}
