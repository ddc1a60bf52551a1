//! # 输入来源模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“解码器准备后的中间表示”统一为一个枚举：
//! - `Url` / `Path` / `DataUrl`：需要先加载字节的轻量表示
//! - `Bytes` / `Blob`：已在内存中的编码字节
//! - `Bitmap`：已解码的原始帧（相当于 ImageBitmap）
//!
//! 解码器的 `can_handle` 通常只看轻量表示，`prepare_for_decode`
//! 再把它转换成 `decode` 需要的重表示（例如 URL → 字节）。

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use reqwest::Url;

/// 原始位图的字节排列。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapLayout {
    Rgba8,
    Rgb8,
    Bgra8,
}

impl BitmapLayout {
    pub fn channels(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 | Self::Bgra8 => 4,
        }
    }
}

/// 已解码的原始帧。
#[derive(Clone, PartialEq, Eq)]
pub struct RawBitmap {
    pub width: u32,
    pub height: u32,
    pub layout: BitmapLayout,
    pub data: Vec<u8>,
}

impl fmt::Debug for RawBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawBitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// 解码输入。
#[derive(Debug, Clone)]
pub enum PixelInput {
    /// `http(s)://` 或 `file://` 地址。
    Url(Url),
    /// 本地文件路径。
    Path(PathBuf),
    /// 内存中的编码字节。
    Bytes(Bytes),
    /// `data:<mime>;base64,<payload>`。
    DataUrl(String),
    /// 带可选 MIME 类型的字节块。
    Blob {
        bytes: Bytes,
        mime_type: Option<String>,
    },
    /// 已解码的原始帧。
    Bitmap(RawBitmap),
}

impl PixelInput {
    /// 从字符串识别输入：Data URL → http/https/file URL → 本地路径。
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();

        if trimmed.starts_with("data:") {
            return Self::DataUrl(trimmed.to_string());
        }

        if let Ok(url) = Url::parse(trimmed) {
            if matches!(url.scheme(), "http" | "https" | "file") {
                return Self::Url(url);
            }
        }

        Self::Path(PathBuf::from(value))
    }

    /// 运行时类型名，用于诊断信息。
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Url(_) => "url",
            Self::Path(_) => "path",
            Self::Bytes(_) => "bytes",
            Self::DataUrl(_) => "data-url",
            Self::Blob { .. } => "blob",
            Self::Bitmap(_) => "bitmap",
        }
    }

    /// 来源自带的 MIME 提示。
    pub fn mime_hint(&self) -> Option<&str> {
        match self {
            Self::Blob { mime_type, .. } => mime_type.as_deref(),
            Self::DataUrl(data) => data
                .strip_prefix("data:")
                .and_then(|rest| rest.split([';', ',']).next())
                .filter(|mime| !mime.is_empty()),
            _ => None,
        }
    }
}

impl From<&str> for PixelInput {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for PixelInput {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<PathBuf> for PixelInput {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for PixelInput {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Url> for PixelInput {
    fn from(value: Url) -> Self {
        Self::Url(value)
    }
}

impl From<Vec<u8>> for PixelInput {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for PixelInput {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<RawBitmap> for PixelInput {
    fn from(value: RawBitmap) -> Self {
        Self::Bitmap(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_classifies_strings() {
        assert_eq!(PixelInput::parse("https://example.com/a.png").kind(), "url");
        assert_eq!(PixelInput::parse("file:///tmp/a.png").kind(), "url");
        assert_eq!(PixelInput::parse("data:image/png;base64,AAAA").kind(), "data-url");
        assert_eq!(PixelInput::parse("./images/a.png").kind(), "path");
        assert_eq!(PixelInput::parse("C:/images/a.png").kind(), "path");
    }

    #[test]
    fn mime_hint_reads_data_url_and_blob() {
        let data = PixelInput::parse("data:image/gif;base64,R0lG");
        assert_eq!(data.mime_hint(), Some("image/gif"));

        let blob = PixelInput::Blob {
            bytes: Bytes::from_static(b"x"),
            mime_type: Some("image/webp".to_string()),
        };
        assert_eq!(blob.mime_hint(), Some("image/webp"));
        assert_eq!(PixelInput::from(vec![1_u8]).mime_hint(), None);
    }
}
