//! 投递管道数据模型
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// MessageStatus — 消息投递状态机
// ---------------------------------------------------------------------------

/// 单条消息的投递状态
///
/// 状态机边集：queued -> delivering -> {delivered, skipped, retrying, failed}，
/// retrying -> delivering 循环直到成功或重试预算耗尽。
/// delivered / skipped / failed 为终态，一旦进入不再离开。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum MessageStatus {
    /// 已入队 - 消息记录已持久化，等待工作者领取
    #[default]
    Queued,
    /// 投递中 - 已被某个工作者独占处理
    Delivering,
    /// 已投递 - 传输层确认发送成功
    Delivered,
    /// 已跳过 - 收件人已退订，未尝试传输的非失败终态
    Skipped,
    /// 待重试 - 瞬时失败，已按退避策略重新排队
    Retrying,
    /// 已失败 - 永久失败或重试预算耗尽
    Failed,
}

impl MessageStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Skipped | Self::Failed)
    }

    /// 是否仍在途（尚未离开瞬时状态）
    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }

    /// 状态机转移是否合法
    ///
    /// 终态拒绝一切转移，保证崩溃重启后的重复派发不会二次投递。
    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        match (self, next) {
            (Queued, Delivering) => true,
            (Delivering, Delivered | Skipped | Retrying | Failed) => true,
            (Retrying, Delivering) => true,
            _ => false,
        }
    }

    /// 数据库中的状态字面量
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Delivering => "delivering",
            Self::Delivered => "delivered",
            Self::Skipped => "skipped",
            Self::Retrying => "retrying",
            Self::Failed => "failed",
        }
    }
}

// ---------------------------------------------------------------------------
// Message — 每收件人一条的投递记录
// ---------------------------------------------------------------------------

/// 消息记录
///
/// 每个（campaign, recipient）对应一行，由入队器在入队事务中创建，
/// 此后仅由持有对应任务的工作者更新状态。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: String,
    pub campaign_id: String,
    pub status: MessageStatus,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// 创建一条处于 queued 状态的新消息
    ///
    /// ID 在创建时生成且全局唯一，之后作为投递任务的外键贯穿整个生命周期。
    pub fn new(campaign_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            campaign_id: campaign_id.to_string(),
            status: MessageStatus::Queued,
            updated_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Receipt — 发送计数凭据
// ---------------------------------------------------------------------------

/// 发送凭据
///
/// 以 (user_guid, client_id, kind_id) 为唯一键的去重计数账本，
/// 服务于单通知路径的幂等重复发送记账，与活动投递互相独立。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Receipt {
    pub user_guid: String,
    pub client_id: String,
    pub kind_id: String,
    pub count: i32,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// CampaignType / Unsubscribe — 退订过滤依赖的记录
// ---------------------------------------------------------------------------

/// 活动类型
///
/// critical 为真的类型不可被用户退订，投递时绕过退订过滤。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CampaignType {
    pub id: String,
    pub name: String,
    pub critical: bool,
}

/// 退订记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Unsubscribe {
    pub campaign_type_id: String,
    pub user_guid: String,
}

// ---------------------------------------------------------------------------
// Recipient / Audience — 收件人与发送目标
// ---------------------------------------------------------------------------

/// 已解析的收件人
///
/// 由收件人解析器产出：GUID 与邮箱已去重，endorsement 为该收件人
/// 专属的个性化说明文案。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_guid: String,
    pub email: String,
    #[serde(default)]
    pub endorsement: String,
}

/// 发送目标描述
///
/// 解析为具体收件人列表的工作由外部协作者完成（见 resolver 模块）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "value")]
pub enum Audience {
    /// 明确的邮箱列表
    Emails(Vec<String>),
    /// 单个用户 GUID
    User(String),
    /// 一个空间下的全部成员
    Space(String),
    /// 一个组织下的全部成员
    Organization(String),
    /// 全量用户
    Everyone,
}

/// 空间上下文，随投递任务透传
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub guid: String,
    pub name: String,
}

/// 组织上下文，随投递任务透传
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub guid: String,
    pub name: String,
}
