//! # 原生解码器
//!
//! 基于 `image` crate 的解码流水线：
//! 1. 签名识别格式并读取 header 尺寸
//! 2. 按像素与内存上限快速拒绝
//! 3. 完整解码（GIF 可选帧）
//! 4. 转换为 RGBA 并校验长度
//!
//! 编解码是 CPU 密集的同步调用，放在 `spawn_blocking` 中执行。
//! 每次请求都从 [`SharedConfig`] 取快照，加载与解码上限随 `set_config` 生效。

use std::io::Cursor;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ImageFormat, ImageReader};

use crate::config::{PixeliftConfig, SharedConfig};
use crate::env::Platform;
use crate::error::PixelError;
use crate::format::{detect, is_image_mime};
use crate::input::PixelInput;
use crate::loader::BufferLoader;
use crate::options::DecodeOptions;
use crate::pixel::PixelData;
use crate::plugin::{DecoderMetadata, PixelDecoder};

#[derive(Debug, Clone, Copy)]
struct DecodeLimits {
    max_pixels: u64,
    max_bytes: u64,
}

impl From<&PixeliftConfig> for DecodeLimits {
    fn from(config: &PixeliftConfig) -> Self {
        Self {
            max_pixels: config.max_decoded_pixels,
            max_bytes: config.max_decoded_bytes,
        }
    }
}

pub struct ImageDecoder {
    config: SharedConfig,
    metadata: DecoderMetadata,
}

impl ImageDecoder {
    pub const NAME: &'static str = "image";
    pub const PRIORITY: i32 = 1000;

    pub fn new(config: SharedConfig) -> Self {
        Self {
            config,
            metadata: DecoderMetadata {
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
                platforms: vec![Platform::Server],
                contexts: Vec::new(),
                formats: ["image/png", "image/jpeg", "image/gif", "image/webp", "image/bmp", "image/tiff", "image/x-icon"]
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                description: Some("image crate 原生解码".to_string()),
            },
        }
    }
}

#[async_trait]
impl PixelDecoder for ImageDecoder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn metadata(&self) -> Option<&DecoderMetadata> {
        Some(&self.metadata)
    }

    async fn can_handle(&self, input: &PixelInput, options: &DecodeOptions) -> Result<bool, PixelError> {
        let hinted_non_image = options
            .mime_type
            .as_deref()
            .or_else(|| input.mime_hint())
            .is_some_and(|mime| !is_image_mime(mime));
        if hinted_non_image {
            return Ok(false);
        }

        Ok(match input {
            PixelInput::Bytes(bytes) | PixelInput::Blob { bytes, .. } => detect(bytes).is_some(),
            PixelInput::Url(url) => matches!(url.scheme(), "http" | "https" | "file"),
            PixelInput::Path(_) | PixelInput::DataUrl(_) => true,
            PixelInput::Bitmap(_) => false,
        })
    }

    async fn prepare_for_decode(
        &self,
        input: PixelInput,
        options: &DecodeOptions,
    ) -> Result<PixelInput, PixelError> {
        let loader = BufferLoader::new(self.config.snapshot()?);
        let bytes = loader.load(&input, options).await?;
        Ok(PixelInput::Bytes(bytes))
    }

    async fn decode(&self, input: PixelInput, options: &DecodeOptions) -> Result<PixelData, PixelError> {
        let config = self.config.snapshot()?;
        let limits = DecodeLimits::from(&config);
        let bytes = BufferLoader::new(config).load(&input, options).await?;

        let frame = options.frame;
        let blocking = tokio::task::spawn_blocking(move || decode_rgba(&bytes, frame, limits));

        let joined = tokio::select! {
            biased;
            _ = options.cancelled() => return Err(PixelError::Cancelled),
            joined = blocking => joined,
        };

        joined.map_err(|e| PixelError::Internal(format!("解码线程异常：{}", e)))?
    }
}

fn decode_rgba(bytes: &Bytes, frame: u32, limits: DecodeLimits) -> Result<PixelData, PixelError> {
    let start = Instant::now();

    let detected = detect(bytes)
        .ok_or_else(|| PixelError::InvalidFormat("无法识别图片格式".to_string()))?;

    let (header_width, header_height) = ImageReader::with_format(Cursor::new(&bytes[..]), detected.format)
        .into_dimensions()
        .map_err(|e| PixelError::InvalidFormat(format!("无法读取图片尺寸：{}", e)))?;
    validate_limits(limits, header_width, header_height)?;

    let rgba = if detected.format == ImageFormat::Gif {
        decode_gif_frame(bytes, frame)?
    } else {
        if frame > 0 {
            return Err(PixelError::InvalidFormat(format!(
                "{} 不是动图，无法选择第 {} 帧",
                detected.mime_type, frame
            )));
        }

        let mut reader = ImageReader::with_format(Cursor::new(&bytes[..]), detected.format);
        let mut reader_limits = image::Limits::default();
        reader_limits.max_alloc = Some(limits.max_bytes);
        reader.limits(reader_limits);

        reader.decode().map_err(map_image_error)?.to_rgba8()
    };

    let (width, height) = rgba.dimensions();
    validate_limits(limits, width, height)?;
    let pixels = PixelData::new(width, height, rgba.into_raw())?;

    log::info!(
        "✅ 图片解码成功 - 格式: {} 尺寸: {}x{} 耗时: {:?}",
        detected.mime_type,
        width,
        height,
        start.elapsed()
    );

    Ok(pixels)
}

fn decode_gif_frame(bytes: &Bytes, index: u32) -> Result<image::RgbaImage, PixelError> {
    let decoder = GifDecoder::new(Cursor::new(&bytes[..])).map_err(map_image_error)?;

    let frame = decoder
        .into_frames()
        .nth(index as usize)
        .ok_or_else(|| PixelError::InvalidFormat(format!("GIF 帧索引越界：{}", index)))?
        .map_err(map_image_error)?;

    Ok(frame.into_buffer())
}

fn validate_limits(limits: DecodeLimits, width: u32, height: u32) -> Result<(), PixelError> {
    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| PixelError::ResourceLimit("图片像素数溢出".to_string()))?;

    if pixels > limits.max_pixels {
        return Err(PixelError::ResourceLimit(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, limits.max_pixels
        )));
    }

    let estimated = pixels
        .checked_mul(PixelData::CHANNELS as u64)
        .ok_or_else(|| PixelError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

    if estimated > limits.max_bytes {
        return Err(PixelError::ResourceLimit(format!(
            "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
            estimated as f64 / 1024.0 / 1024.0,
            limits.max_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    Ok(())
}

fn map_image_error(error: image::ImageError) -> PixelError {
    match error {
        image::ImageError::Limits(e) => PixelError::ResourceLimit(format!("解码超出资源限制：{}", e)),
        image::ImageError::Unsupported(e) => PixelError::InvalidFormat(format!("不支持的图片格式：{}", e)),
        other => PixelError::Decode(format!("图片解码失败：{}", other)),
    }
}
