//! # 解码器解析
//!
//! 1. 显式指定（`options.decoder`）且该解码器声明可处理时直接采用；
//!    未注册、返回 `false` 或探测出错时记录一次警告，再转为自动选择。
//! 2. 自动选择：按优先级降序逐个探测，第一个返回 `true` 的胜出；
//!    探测出错视为 `false`，继续下一个。
//! 3. 全部落空返回 `NoSuitableDecoder`，并带上输入类型名。
//!
//! 选定之后的 `prepare_for_decode` / `decode` 错误原样向上传递，不再回退。

use std::time::Instant;

use crate::error::PixelError;
use crate::input::PixelInput;
use crate::options::DecodeOptions;
use crate::pixel::PixelData;

use super::decoder::SharedDecoder;
use super::registry::DecoderRegistry;

/// 探测单个解码器，错误降级为 `false`。
async fn probe(decoder: &SharedDecoder, input: &PixelInput, options: &DecodeOptions) -> bool {
    match decoder.can_handle(input, options).await {
        Ok(capable) => {
            log::debug!("🔎 探测解码器 {}: {}", decoder.name(), capable);
            capable
        }
        Err(err) => {
            log::warn!(
                "⚠️ 解码器 {} 探测失败，按不可处理继续: {} (code={})",
                decoder.name(),
                err,
                err.code()
            );
            false
        }
    }
}

/// 为输入选出唯一解码器。
pub async fn resolve_decoder(
    registry: &DecoderRegistry,
    input: &PixelInput,
    options: &DecodeOptions,
) -> Result<SharedDecoder, PixelError> {
    if options.is_cancelled() {
        return Err(PixelError::Cancelled);
    }

    if let Some(requested) = options.decoder.as_deref() {
        if let Some(decoder) = registry.get(requested) {
            if probe(&decoder, input, options).await {
                log::debug!("🎯 使用指定解码器: {}", requested);
                return Ok(decoder);
            }
        }

        log::warn!(
            "⚠️ 指定的解码器 {} 无法处理输入或未注册，转为自动选择",
            requested
        );
    }

    for decoder in registry.list_by_priority() {
        if options.is_cancelled() {
            return Err(PixelError::Cancelled);
        }

        if probe(&decoder, input, options).await {
            log::debug!("🎯 自动选择解码器: {} (priority={})", decoder.name(), decoder.priority());
            return Ok(decoder);
        }
    }

    Err(PixelError::NoSuitableDecoder {
        input_kind: input.kind(),
    })
}

/// 按优先级列出所有声明可处理该输入的解码器。用于诊断，不做显式指定处理。
pub async fn capable_decoders(
    registry: &DecoderRegistry,
    input: &PixelInput,
    options: &DecodeOptions,
) -> Vec<SharedDecoder> {
    let mut capable = Vec::new();
    for decoder in registry.list_by_priority() {
        if probe(&decoder, input, options).await {
            capable.push(decoder);
        }
    }
    capable
}

/// 在已选定的解码器上执行两阶段解码：先准备，再解码。
pub async fn run_decoder(
    decoder: &SharedDecoder,
    input: PixelInput,
    options: &DecodeOptions,
) -> Result<PixelData, PixelError> {
    let prepare_start = Instant::now();
    let prepared = decoder.prepare_for_decode(input, options).await?;
    log::debug!(
        "📦 {} 准备输入完成 ({}) - 耗时 {:?}",
        decoder.name(),
        prepared.kind(),
        prepare_start.elapsed()
    );

    if options.is_cancelled() {
        return Err(PixelError::Cancelled);
    }

    let pixels = decoder.decode(prepared, options).await?;

    if !pixels.is_consistent() {
        return Err(PixelError::Decode(format!(
            "解码器 {} 返回的像素数据长度与尺寸不符：{} 字节，{}x{}",
            decoder.name(),
            pixels.data.len(),
            pixels.width,
            pixels.height
        )));
    }

    Ok(pixels)
}
