//! 日志初始化

use tracing_subscriber::{fmt, EnvFilter};

/// 初始化全局日志
///
/// 优先使用 `RUST_LOG`；未设置时默认 `info`，`verbose` 为真时本 crate 提升到 `debug`。
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    // 测试中可能被多次调用，重复初始化直接忽略
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "info,rail_madad=debug,tower_http=debug"
    } else {
        "info"
    }
}
