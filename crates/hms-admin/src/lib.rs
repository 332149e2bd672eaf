//! # HMS管理模块
//!
//! 提供运行配置与日志初始化：
//! - 配置加载：默认值、配置文件与 `HMS__` 环境变量分层合并
//! - 配置验证：端口、连接池、税率、实时事件队列等规则
//! - 日志：基于 tracing-subscriber 的 EnvFilter 初始化

pub mod config;
pub mod logging;

pub use config::{
    BillingConfig, ConfigManager, ConfigValidator, DatabaseConfig, HmsConfig, LoggingConfig,
    ServerConfig, StorageBackend, StorageConfig,
};
pub use logging::init_logging;
