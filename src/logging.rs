//! 日志初始化。
//!
//! 库内部只使用 `log` 门面；宿主进程可调用 [`init`] 挂上 `env_logger`，
//! 默认级别为 `info`，可通过 `RUST_LOG` 覆盖。

/// 初始化 `env_logger`。重复调用安全。
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// 测试专用：输出交给测试框架捕获。
pub fn init_for_tests() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}
