//! # 运行时环境探测
//!
//! 平台由编译目标决定（`wasm32` 视为浏览器，其余视为服务端进程）；
//! 上下文由当前线程决定：名为 `main` 的线程视为主线程，其余（tokio 工作线程、
//! 自建线程池等）视为 worker。线程名并不总是可靠，配置里的 `context`
//! 可以直接指定上下文，探测只作为缺省值。

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Server,
    Browser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Main,
    Worker,
}

/// 当前运行时：平台 × 上下文。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeEnv {
    pub platform: Platform,
    pub context: Context,
}

impl RuntimeEnv {
    pub const fn new(platform: Platform, context: Context) -> Self {
        Self { platform, context }
    }

    pub fn detect() -> Self {
        let platform = if cfg!(target_arch = "wasm32") {
            Platform::Browser
        } else {
            Platform::Server
        };

        let context = match std::thread::current().name() {
            Some("main") => Context::Main,
            _ => Context::Worker,
        };

        Self { platform, context }
    }

    /// 探测运行时；`context` 给出时覆盖线程探测的结果。
    pub fn detect_with(context: Option<Context>) -> Self {
        let detected = Self::detect();
        Self {
            context: context.unwrap_or(detected.context),
            ..detected
        }
    }
}

impl fmt::Display for RuntimeEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let platform = match self.platform {
            Platform::Server => "server",
            Platform::Browser => "browser",
        };
        let context = match self.context {
            Context::Main => "main",
            Context::Worker => "worker",
        };
        write!(f, "{}/{}", platform, context)
    }
}
