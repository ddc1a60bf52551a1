//! # 解码器契约
//!
//! 编排层（解析器、队列、门面）只依赖这个 trait，不知道具体解码技术
//! （原生编解码库、原始位图、队列卸载等）。

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::env::{Context, Platform, RuntimeEnv};
use crate::error::PixelError;
use crate::input::PixelInput;
use crate::options::DecodeOptions;
use crate::pixel::PixelData;

/// 描述性元数据，只用于过滤，不参与正确性判断。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoderMetadata {
    pub version: Option<String>,
    /// 支持的平台；为空表示不限。
    pub platforms: Vec<Platform>,
    /// 支持的上下文；为空表示不限。
    pub contexts: Vec<Context>,
    /// 支持的格式（MIME 或扩展名）。
    pub formats: Vec<String>,
    pub description: Option<String>,
}

impl DecoderMetadata {
    /// 当前运行时是否在声明范围内。
    pub fn supports(&self, env: RuntimeEnv) -> bool {
        (self.platforms.is_empty() || self.platforms.contains(&env.platform))
            && (self.contexts.is_empty() || self.contexts.contains(&env.context))
    }
}

/// 解码器契约。
///
/// - `can_handle` 必须无副作用且快速；返回错误会被视为“无法处理”。
/// - `prepare_for_decode` 可选，把原始输入转换为 `decode` 需要的表示；
///   失败按解码失败处理。
/// - `dispose` 在注册表销毁时调用，而不是每次解码后调用。
#[async_trait]
pub trait PixelDecoder: Send + Sync {
    /// 注册表中的唯一名称。
    fn name(&self) -> &str;

    /// 优先级，越大越优先。
    fn priority(&self) -> i32 {
        0
    }

    fn metadata(&self) -> Option<&DecoderMetadata> {
        None
    }

    async fn can_handle(&self, input: &PixelInput, options: &DecodeOptions) -> Result<bool, PixelError>;

    async fn prepare_for_decode(
        &self,
        input: PixelInput,
        _options: &DecodeOptions,
    ) -> Result<PixelInput, PixelError> {
        Ok(input)
    }

    async fn decode(&self, input: PixelInput, options: &DecodeOptions) -> Result<PixelData, PixelError>;

    async fn dispose(&self) {}
}

impl fmt::Debug for dyn PixelDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelDecoder")
            .field("name", &self.name())
            .field("priority", &self.priority())
            .finish_non_exhaustive()
    }
}

/// 注册表中保存的解码器句柄。
pub type SharedDecoder = Arc<dyn PixelDecoder>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl PixelDecoder for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn priority(&self) -> i32 {
            7
        }

        async fn can_handle(&self, _input: &PixelInput, _options: &DecodeOptions) -> Result<bool, PixelError> {
            Ok(false)
        }

        async fn decode(&self, _input: PixelInput, _options: &DecodeOptions) -> Result<PixelData, PixelError> {
            PixelData::new(0, 0, Vec::new())
        }
    }

    #[test]
    fn shared_decoder_debug_shows_name_and_priority() {
        let decoder: SharedDecoder = Arc::new(Fixed);
        let result: Result<SharedDecoder, PixelError> = Ok(decoder);

        let rendered = format!("{:?}", result);
        assert!(rendered.contains("\"fixed\""), "{rendered}");
        assert!(rendered.contains("priority: 7"), "{rendered}");
    }

    #[test]
    fn empty_metadata_supports_everything() {
        let metadata = DecoderMetadata::default();
        assert!(metadata.supports(RuntimeEnv::new(Platform::Server, Context::Worker)));
        assert!(metadata.supports(RuntimeEnv::new(Platform::Browser, Context::Main)));
    }

    #[test]
    fn platform_and_context_filters_combine() {
        let metadata = DecoderMetadata {
            platforms: vec![Platform::Server],
            contexts: vec![Context::Worker],
            ..DecoderMetadata::default()
        };

        assert!(metadata.supports(RuntimeEnv::new(Platform::Server, Context::Worker)));
        assert!(!metadata.supports(RuntimeEnv::new(Platform::Server, Context::Main)));
        assert!(!metadata.supports(RuntimeEnv::new(Platform::Browser, Context::Worker)));
    }
}
