//! 仓储 Trait 定义
//!
//! 投递工作者只依赖这两个接口，便于在测试中用内存实现替换真实数据库。

use async_trait::async_trait;

use courier_shared::error::Result;

use crate::models::MessageStatus;

/// 消息状态存储接口
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// 守卫式状态写入
    ///
    /// 仅当消息尚未进入终态时更新状态并刷新 updated_at；
    /// 返回 false 表示消息已处于终态（或不存在），调用方应将本次
    /// 派发视为重复投递并直接确认任务，绝不二次发送。
    async fn transition(&self, message_id: &str, to: MessageStatus) -> Result<bool>;
}

/// 退订过滤接口
#[async_trait]
pub trait SuppressionStore: Send + Sync {
    /// 收件人是否应被抑制
    ///
    /// 关键（critical）活动类型永远返回 false，且不查询退订状态。
    async fn is_suppressed(&self, campaign_type_id: &str, user_guid: &str) -> Result<bool>;
}
