//! 错误定义模块

use thiserror::Error;

/// HMS系统统一错误类型
#[derive(Error, Debug)]
pub enum HmsError {
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("单据已支付: {0}")]
    AlreadyPaid(String),

    /// 缺少必需的基础数据（例如收费项目字典为空）
    #[error("系统数据错误: {0}")]
    System(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl HmsError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        HmsError::NotFound(format!("{} {}", entity, id))
    }

    pub fn already_paid(entity: &str, id: impl std::fmt::Display) -> Self {
        HmsError::AlreadyPaid(format!("{} {}", entity, id))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for HmsError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => HmsError::NotFound("row".to_string()),
            other => HmsError::Database(other.to_string()),
        }
    }
}

/// HMS系统统一结果类型
pub type Result<T> = std::result::Result<T, HmsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = HmsError::not_found("Visit", "v-1");
        assert_eq!(err.to_string(), "资源未找到: Visit v-1");

        let err = HmsError::InvalidStateTransition {
            from: "Occupied".to_string(),
            event: "Occupy".to_string(),
        };
        assert!(err.to_string().contains("Occupied"));
    }
}
