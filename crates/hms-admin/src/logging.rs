//! 日志初始化
//!
//! 优先使用 RUST_LOG 环境变量，未设置时使用配置中的过滤规则。

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// 构建日志过滤器
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    resolve_filter(env.as_deref(), level)
}

/// 合法的 RUST_LOG 优先，为空或无法解析时回退到配置级别
fn resolve_filter(env: Option<&str>, level: &str) -> Result<EnvFilter> {
    if let Some(filter) = env
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
    {
        return Ok(filter);
    }
    EnvFilter::try_new(level).with_context(|| format!("Invalid log filter: {}", level))
}

/// 初始化全局日志订阅者，只能调用一次
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(&config.level)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized with filter: {}", config.level);
    Ok(())
}
