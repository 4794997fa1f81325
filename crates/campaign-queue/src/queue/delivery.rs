//! 投递任务载荷
//!
//! 队列中流转的持久化工作单元。入队器序列化写入，工作者反序列化消费，
//! 载荷携带单个收件人投递所需的全部上下文，工作者无需回查活动请求。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Organization, Space};

/// 载荷协议版本标签
///
/// 队列是持久化的，滚动升级期间可能同时存在新旧两种载荷，
/// 工作者根据版本标签决定解析方式。
pub const JOB_TYPE_V2: &str = "v2";

/// 每收件人的个性化选项
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOptions {
    /// 说明文案，解释收件人为何收到这封通知
    #[serde(default)]
    pub endorsement: String,
}

/// 投递任务载荷
///
/// `message_id` 引用同一事务中创建的消息记录，二者一一对应；
/// 任务被重新排队（重试）时载荷不变，只有队列侧的尝试计数变化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub job_type: String,
    pub options: DeliveryOptions,
    pub user_guid: String,
    pub email: String,
    pub space: Space,
    pub organization: Organization,
    pub client_id: String,
    pub message_id: String,
    pub uaa_host: String,
    pub scope: String,
    pub vcap_request_id: String,
    /// 原始入站请求的接收时间（UTC）
    pub request_received: DateTime<Utc>,
    pub campaign_id: String,
    pub campaign_type_id: String,
    pub template_id: String,
}
