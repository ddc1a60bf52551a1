// Shared test decoders for integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pixelift::{DecodeOptions, PixelData, PixelDecoder, PixelError, PixelInput, async_trait};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Accept,
    Reject,
    Fail,
}

/// 按固定行为响应探测的解码器，记录探测与解码次数。
pub struct StubDecoder {
    pub name: String,
    pub priority: i32,
    pub probe: Probe,
    pub probes: AtomicUsize,
    pub decodes: AtomicUsize,
    pub disposed: AtomicUsize,
}

impl StubDecoder {
    pub fn new(name: &str, priority: i32, probe: Probe) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            priority,
            probe,
            probes: AtomicUsize::new(0),
            decodes: AtomicUsize::new(0),
            disposed: AtomicUsize::new(0),
        })
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PixelDecoder for StubDecoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn can_handle(&self, _input: &PixelInput, _options: &DecodeOptions) -> Result<bool, PixelError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        match self.probe {
            Probe::Accept => Ok(true),
            Probe::Reject => Ok(false),
            Probe::Fail => Err(PixelError::Internal(format!("{} probe exploded", self.name))),
        }
    }

    async fn decode(&self, _input: PixelInput, _options: &DecodeOptions) -> Result<PixelData, PixelError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        PixelData::new(2, 3, vec![0x7F; 2 * 3 * 4])
    }

    async fn dispose(&self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

/// 解码总是失败的解码器。
pub struct FailingDecoder;

#[async_trait]
impl PixelDecoder for FailingDecoder {
    fn name(&self) -> &str {
        "failing"
    }

    fn priority(&self) -> i32 {
        10_000
    }

    async fn can_handle(&self, _input: &PixelInput, _options: &DecodeOptions) -> Result<bool, PixelError> {
        Ok(true)
    }

    async fn decode(&self, _input: PixelInput, _options: &DecodeOptions) -> Result<PixelData, PixelError> {
        Err(PixelError::Decode("corrupt stream".to_string()))
    }
}

pub fn input() -> PixelInput {
    PixelInput::from(vec![1_u8, 2, 3])
}

/// 解码前等待指定时长，可被取消信号提前打断。
pub struct SlowDecoder {
    pub delay: std::time::Duration,
}

#[async_trait]
impl PixelDecoder for SlowDecoder {
    fn name(&self) -> &str {
        "slow"
    }

    async fn can_handle(&self, _input: &PixelInput, _options: &DecodeOptions) -> Result<bool, PixelError> {
        Ok(true)
    }

    async fn decode(&self, _input: PixelInput, options: &DecodeOptions) -> Result<PixelData, PixelError> {
        tokio::select! {
            _ = options.cancelled() => Err(PixelError::Cancelled),
            _ = tokio::time::sleep(self.delay) => PixelData::new(1, 1, vec![0; 4]),
        }
    }
}
