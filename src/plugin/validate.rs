use crate::error::PixelError;

use super::decoder::PixelDecoder;

/// 注册前的结构校验：名称去除空白后不能为空，也不能包含控制字符。
pub fn validate_decoder(decoder: &dyn PixelDecoder) -> Result<(), PixelError> {
    let name = decoder.name();

    if name.trim().is_empty() {
        return Err(PixelError::Config("解码器名称不能为空".to_string()));
    }

    if name.chars().any(char::is_control) {
        return Err(PixelError::Config(format!(
            "解码器名称包含非法字符：{:?}",
            name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::input::PixelInput;
    use crate::options::DecodeOptions;
    use crate::pixel::PixelData;

    struct Named(&'static str);

    #[async_trait]
    impl PixelDecoder for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn can_handle(&self, _input: &PixelInput, _options: &DecodeOptions) -> Result<bool, PixelError> {
            Ok(false)
        }

        async fn decode(&self, _input: PixelInput, _options: &DecodeOptions) -> Result<PixelData, PixelError> {
            PixelData::new(0, 0, Vec::new())
        }
    }

    #[test]
    fn blank_or_control_names_are_rejected() {
        assert!(matches!(validate_decoder(&Named("")), Err(PixelError::Config(_))));
        assert!(matches!(validate_decoder(&Named("   ")), Err(PixelError::Config(_))));
        assert!(matches!(validate_decoder(&Named("bad\nname")), Err(PixelError::Config(_))));
        assert!(validate_decoder(&Named("png-native")).is_ok());
    }
}
