//! 投递阶段错误类型
//!
//! 投递错误分为瞬时与永久两类：瞬时错误会按退避策略重新入队，
//! 永久错误直接将消息置为 failed，不再消耗重试次数。

use courier_shared::error::CourierError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// 瞬时失败（连接超时、对端暂时不可用等），可重试
    #[error("瞬时投递失败: {reason}")]
    Transient { reason: String },

    /// 永久失败（地址被拒、内容非法等），不可重试
    #[error("永久投递失败: {reason}")]
    Permanent { reason: String },

    /// 模板不存在，按永久失败处理
    #[error("模板未找到: {template_id}")]
    TemplateNotFound { template_id: String },

    /// 模板渲染失败，按永久失败处理
    #[error("模板渲染失败: {0}")]
    RenderFailed(String),

    /// 底层存储或队列错误
    #[error(transparent)]
    Shared(#[from] CourierError),
}

impl DeliveryError {
    /// 是否值得按退避策略重试
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transient { .. } => true,
            Self::Shared(e) => e.is_retryable(),
            Self::Permanent { .. } | Self::TemplateNotFound { .. } | Self::RenderFailed(_) => false,
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::Permanent {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_is_retryable() {
        assert!(DeliveryError::transient("连接超时").is_retryable());
    }

    #[test]
    fn test_permanent_is_not_retryable() {
        assert!(!DeliveryError::permanent("邮箱地址被拒").is_retryable());
        assert!(
            !DeliveryError::TemplateNotFound {
                template_id: "tpl-1".to_string()
            }
            .is_retryable()
        );
    }
}
