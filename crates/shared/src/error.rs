//! 统一错误处理模块
//!
//! 定义投递管道各 crate 共享的错误类型，使用 thiserror 提供良好的错误信息。
//! 唯一键冲突通过 sqlx 的结构化数据库错误识别，而非匹配错误字符串。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum CourierError {
    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(sqlx::Error),

    #[error("数据库迁移失败: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    #[error("记录已存在: {entity} key={key}")]
    DuplicateRecord { entity: String, key: String },

    // ==================== 队列错误 ====================
    #[error("队列操作失败: {0}")]
    Queue(String),

    /// 入队事务中的任意失败。整批消息插入与任务提交一起回滚，
    /// 调用方只会看到这一个错误，不存在部分成功。
    #[error("入队失败: {0}")]
    Enqueue(String),

    // ==================== 权限错误 ====================
    #[error("操作被禁止: {operation}")]
    Forbidden { operation: String },

    // ==================== 配置错误 ====================
    #[error("配置加载失败: {0}")]
    Config(#[from] config::ConfigError),

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, CourierError>;

impl CourierError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::DuplicateRecord { .. } => "DUPLICATE_RECORD",
            Self::Queue(_) => "QUEUE_ERROR",
            Self::Enqueue(_) => "ENQUEUE_FAILURE",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 数据库与队列故障视为瞬时故障；业务语义错误（未找到、重复、禁止）
    /// 重试也不会改变结果，不应重试。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Queue(_))
    }
}

impl From<sqlx::Error> for CourierError {
    /// 将 sqlx 错误映射到结构化错误类型
    ///
    /// 唯一约束冲突单独识别为 `DuplicateRecord`，由调用方补充实体与键名；
    /// 行未找到映射为通用 `NotFound`，其余保留原始数据库错误。
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound {
                entity: "record".to_string(),
                id: String::new(),
            },
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::DuplicateRecord {
                entity: "record".to_string(),
                key: db.constraint().unwrap_or_default().to_string(),
            },
            _ => Self::Database(err),
        }
    }
}
