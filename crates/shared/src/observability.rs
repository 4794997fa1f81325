//! 日志初始化模块
//!
//! 基于 tracing-subscriber 提供结构化日志输出，
//! 支持 EnvFilter 级别过滤和 json/pretty 两种输出格式。

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ObservabilityConfig;

/// 初始化全局日志订阅者
///
/// 过滤级别优先读取 RUST_LOG 环境变量，未设置时回退到配置中的 log_level。
/// 生产环境建议使用 json 格式便于日志采集系统解析。
/// 重复调用会 panic（tracing 全局订阅者只能设置一次），由进程入口保证只调一次。
pub fn init_tracing(service_name: &str, config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_current_span(false))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }

    tracing::info!(service = service_name, format = %config.log_format, "日志已初始化");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_pretty() {
        // 全局订阅者在测试进程中只能安装一次，这里只验证不 panic
        let config = ObservabilityConfig::default();
        init_tracing("courier-test", &config);
    }
}
