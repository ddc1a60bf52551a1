//! # 像素数据模型
//!
//! 解码结果统一为 RGBA8 交错排列：`data.len() == width * height * 4`。
//! 三通道来源补齐不透明 alpha（`0xFF`），BGRA 来源交换 R/B 通道。

use crate::error::PixelError;

/// 解码结果：宽、高与 RGBA 字节数组。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelData {
    /// RGBA 字节数组（`width * height * 4`）。
    pub data: Vec<u8>,
    /// 图像宽度（像素）。
    pub width: u32,
    /// 图像高度（像素）。
    pub height: u32,
}

impl PixelData {
    /// 输出通道数，固定为 4。
    pub const CHANNELS: usize = 4;

    /// 构造并校验字节长度。
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PixelError> {
        let expected = Self::expected_len(width, height, Self::CHANNELS)?;
        if data.len() != expected {
            return Err(PixelError::Decode(format!(
                "像素数据长度异常：{}（期望 {}x{}x4 = {}）",
                data.len(),
                width,
                height,
                expected
            )));
        }

        Ok(Self { data, width, height })
    }

    /// 从 RGB 三通道数据构造，alpha 补 `0xFF`。
    pub fn from_rgb(width: u32, height: u32, rgb: &[u8]) -> Result<Self, PixelError> {
        let expected = Self::expected_len(width, height, 3)?;
        if rgb.len() != expected {
            return Err(PixelError::Decode(format!(
                "RGB 数据长度异常：{}（期望 {}）",
                rgb.len(),
                expected
            )));
        }

        let mut data = Vec::with_capacity(expected / 3 * Self::CHANNELS);
        for px in rgb.chunks_exact(3) {
            data.extend_from_slice(&[px[0], px[1], px[2], 0xFF]);
        }

        Self::new(width, height, data)
    }

    /// 从 BGRA 数据构造，原地交换 R/B。
    pub fn from_bgra(width: u32, height: u32, mut bgra: Vec<u8>) -> Result<Self, PixelError> {
        for px in bgra.chunks_exact_mut(Self::CHANNELS) {
            px.swap(0, 2);
        }
        Self::new(width, height, bgra)
    }

    /// `width * height * channels`，溢出时返回资源限制错误。
    pub fn expected_len(width: u32, height: u32, channels: usize) -> Result<usize, PixelError> {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(channels))
            .ok_or_else(|| PixelError::ResourceLimit("图片尺寸导致内存溢出风险".to_string()))
    }

    pub fn pixel_count(&self) -> usize {
        self.data.len() / Self::CHANNELS
    }

    /// 字段是公开的，解码器可能绕过 `new` 构造；编排层用它做最终校验。
    pub fn is_consistent(&self) -> bool {
        Self::expected_len(self.width, self.height, Self::CHANNELS)
            .map(|expected| expected == self.data.len())
            .unwrap_or(false)
    }
}
