//! 活动状态聚合器
//!
//! 扫描同一 campaign_id 下的全部消息记录，按状态汇总并推导活动的
//! 整体状态。聚合是派生视图，不落库——消息表就是唯一事实来源。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courier_shared::error::{CourierError, Result};

use crate::repository::{CampaignRollup, MessagesRepository};

/// 活动整体状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatusKind {
    /// 仍有消息在途
    Sending,
    /// 全部消息到达终态，且至少有一条非失败
    Completed,
    /// 全部消息到达终态且无一送达
    Failed,
}

/// 活动状态视图
///
/// `sent_messages` 包含已投递与已跳过（跳过是非失败终态）；
/// `completed_time` 仅在没有任何在途消息时出现。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignStatus {
    pub campaign_id: String,
    pub status: CampaignStatusKind,
    pub total_messages: i64,
    pub sent_messages: i64,
    pub retry_messages: i64,
    pub failed_messages: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub completed_time: Option<DateTime<Utc>>,
}

/// 活动状态聚合器
#[derive(Clone)]
pub struct CampaignStatuses {
    messages: MessagesRepository,
}

impl CampaignStatuses {
    pub fn new(messages: MessagesRepository) -> Self {
        Self { messages }
    }

    /// 查询活动状态
    ///
    /// 没有任何消息行引用该活动 ID 时报 NotFound。
    pub async fn get(&self, campaign_id: &str) -> Result<CampaignStatus> {
        let rollup = self
            .messages
            .campaign_rollup(campaign_id)
            .await?
            .ok_or_else(|| CourierError::NotFound {
                entity: "Campaign".to_string(),
                id: campaign_id.to_string(),
            })?;

        Ok(derive_status(campaign_id, &rollup))
    }
}

/// 由状态汇总推导活动整体状态
///
/// 与 SQL 解耦的纯函数，推导规则在无数据库的单元测试中逐条验证：
/// - 仍有在途消息（queued/delivering/retrying）=> sending
/// - 全部终态且无一送达、存在失败 => failed
/// - 其余 => completed
pub fn derive_status(campaign_id: &str, rollup: &CampaignRollup) -> CampaignStatus {
    let sent = rollup.delivered + rollup.skipped;
    let pending = rollup.pending();

    let status = if pending > 0 {
        CampaignStatusKind::Sending
    } else if rollup.failed > 0 && sent == 0 {
        CampaignStatusKind::Failed
    } else {
        CampaignStatusKind::Completed
    };

    // 最后一条消息离开瞬时状态的时刻即完成时间
    let completed_time = if pending == 0 {
        rollup.last_updated_at
    } else {
        None
    };

    CampaignStatus {
        campaign_id: campaign_id.to_string(),
        status,
        total_messages: rollup.total(),
        sent_messages: sent,
        retry_messages: rollup.retrying,
        failed_messages: rollup.failed,
        start_time: rollup.first_updated_at,
        completed_time,
    }
}
