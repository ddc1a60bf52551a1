//! # 解码器注册表
//!
//! ## 设计思路
//!
//! - 按名称唯一：先注册者生效，重复注册静默忽略，保证自动加载可重复执行。
//! - 注册是唯一的修改操作，同步且永不失败。
//! - 读取返回快照（`Arc` 浅拷贝），调用方遍历、探测期间不持有锁。
//!
//! ## 实现思路
//!
//! 使用 `RwLock<Vec<SharedDecoder>>` 保存注册顺序；`list_by_priority`
//! 对快照做稳定排序，同优先级按注册顺序排列。锁中毒时继续使用内部数据，
//! 因为注册表只做追加，不存在半完成的写入。

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::PixelError;

use super::decoder::{PixelDecoder, SharedDecoder};
use super::validate::validate_decoder;

#[derive(Default)]
pub struct DecoderRegistry {
    decoders: RwLock<Vec<SharedDecoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册解码器；已有同名条目时不做任何修改。
    ///
    /// 返回是否真正插入。
    pub fn register(&self, decoder: SharedDecoder) -> bool {
        let mut decoders = self.decoders.write().unwrap_or_else(PoisonError::into_inner);

        if decoders.iter().any(|existing| existing.name() == decoder.name()) {
            log::debug!("♻️ 解码器已注册，忽略重复注册: {}", decoder.name());
            return false;
        }

        log::debug!(
            "🧩 注册解码器: {} (priority={})",
            decoder.name(),
            decoder.priority()
        );
        decoders.push(decoder);
        true
    }

    pub fn register_decoder<D>(&self, decoder: D) -> bool
    where
        D: PixelDecoder + 'static,
    {
        self.register(Arc::new(decoder))
    }

    /// 校验后注册。校验失败返回 `Config` 错误；重复名称仍是无害的空操作。
    pub fn define(&self, decoder: SharedDecoder) -> Result<bool, PixelError> {
        validate_decoder(decoder.as_ref())?;
        Ok(self.register(decoder))
    }

    /// 注册顺序快照。
    pub fn list(&self) -> Vec<SharedDecoder> {
        self.decoders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 按优先级降序的快照，同优先级保持注册顺序。
    pub fn list_by_priority(&self) -> Vec<SharedDecoder> {
        let mut decoders = self.list();
        // sort_by_key 是稳定排序
        decoders.sort_by_key(|decoder| std::cmp::Reverse(decoder.priority()));
        decoders
    }

    pub fn get(&self, name: &str) -> Option<SharedDecoder> {
        self.decoders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|decoder| decoder.name() == name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.decoders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|decoder| decoder.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.decoders.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 依次释放所有解码器资源。条目保留在注册表中。
    pub async fn dispose_all(&self) {
        for decoder in self.list() {
            log::debug!("🧹 释放解码器: {}", decoder.name());
            decoder.dispose().await;
        }
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("decoders", &self.names())
            .finish()
    }
}
