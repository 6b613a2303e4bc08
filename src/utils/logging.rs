/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use tracing::info;

use crate::config::{Backend, Config};

/// 记录程序启动信息
///
/// # 参数
/// - `config`: 已加载的配置
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 Rail Madad 投诉服务启动");
    info!(
        "🕒 启动时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    match config.config_file.as_deref() {
        Some(path) => info!("📄 配置文件: {}", path),
        None => info!("📄 配置文件: 未使用（默认值 + 环境变量）"),
    }
    info!("🌐 运行环境: {}", config.environment);
    info!("📡 监听端口: {}", config.port);
    info!("🔓 允许来源: {}", config.allowed_origins.join(", "));
    info!(
        "🖼️ 图片大小上限: {}MB",
        config.max_image_bytes / (1024 * 1024)
    );
    match config.backend {
        Backend::Memory => info!("💾 存储后端: 内存（数据不会持久化）"),
        Backend::Google => info!(
            "💾 存储后端: Firestore 项目 {} / GCS 存储桶 {}",
            or_unset(&config.google_project_id),
            or_unset(&config.gcs_bucket_name)
        ),
    }
    info!(
        "🤖 LLM 模型: {} ({})",
        config.llm_model_name,
        if config.llm_configured() { "已配置" } else { "未配置" }
    );
    info!("{}", "=".repeat(60));
}

/// 记录已注册的路由
///
/// # 参数
/// - `routes`: (方法, 路径) 列表
pub fn log_routes(routes: &[(&str, &str)]) {
    info!("📋 已注册 {} 个路由:", routes.len());
    for (method, path) in routes {
        info!("   {:<5} {}", method, path);
    }
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() {
        "<未设置>"
    } else {
        value
    }
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("车窗玻璃破裂", 2), "车窗...");
    }

    #[test]
    fn test_or_unset() {
        assert_eq!(or_unset(""), "<未设置>");
        assert_eq!(or_unset("bucket"), "bucket");
    }
}
