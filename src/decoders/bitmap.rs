//! 原始位图解码器：把已解码的帧统一为 RGBA。

use async_trait::async_trait;

use crate::error::PixelError;
use crate::input::{BitmapLayout, PixelInput, RawBitmap};
use crate::options::DecodeOptions;
use crate::pixel::PixelData;
use crate::plugin::{DecoderMetadata, PixelDecoder};

pub struct BitmapDecoder {
    metadata: DecoderMetadata,
}

impl BitmapDecoder {
    pub const NAME: &'static str = "bitmap";
    pub const PRIORITY: i32 = 2000;

    pub fn new() -> Self {
        Self {
            metadata: DecoderMetadata {
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
                description: Some("已解码位图的通道归一化".to_string()),
                ..DecoderMetadata::default()
            },
        }
    }
}

impl Default for BitmapDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PixelDecoder for BitmapDecoder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn metadata(&self) -> Option<&DecoderMetadata> {
        Some(&self.metadata)
    }

    async fn can_handle(&self, input: &PixelInput, _options: &DecodeOptions) -> Result<bool, PixelError> {
        Ok(matches!(input, PixelInput::Bitmap(_)))
    }

    async fn decode(&self, input: PixelInput, _options: &DecodeOptions) -> Result<PixelData, PixelError> {
        let PixelInput::Bitmap(bitmap) = input else {
            return Err(PixelError::InvalidFormat(format!(
                "位图解码器不支持输入类型：{}",
                input.kind()
            )));
        };

        to_rgba(bitmap)
    }
}

fn to_rgba(bitmap: RawBitmap) -> Result<PixelData, PixelError> {
    let RawBitmap {
        width,
        height,
        layout,
        data,
    } = bitmap;

    let expected = PixelData::expected_len(width, height, layout.channels())?;
    if data.len() != expected {
        return Err(PixelError::Decode(format!(
            "位图数据长度异常：{}（{:?} {}x{} 期望 {}）",
            data.len(),
            layout,
            width,
            height,
            expected
        )));
    }

    match layout {
        BitmapLayout::Rgba8 => PixelData::new(width, height, data),
        BitmapLayout::Rgb8 => PixelData::from_rgb(width, height, &data),
        BitmapLayout::Bgra8 => PixelData::from_bgra(width, height, data),
    }
}
