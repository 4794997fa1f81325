//! 活动投递的数据模型与持久化核心
//!
//! 包含消息/凭据/退订等数据模型、sqlx 仓储、与消息表同事务提交的
//! 持久化任务队列、任务入队器和活动状态聚合器。投递执行在
//! delivery-worker crate 中。

pub mod enqueuer;
pub mod models;
pub mod queue;
pub mod repository;
pub mod resolver;
pub mod status;

pub use enqueuer::{EnqueueContext, JobEnqueuer};
pub use models::{
    Audience, CampaignType, Message, MessageStatus, Organization, Receipt, Recipient, Space,
};
pub use queue::{Delivery, DeliveryOptions, JOB_TYPE_V2, JobSource, LeasedJob, MemoryQueue, PgQueue};
pub use status::{CampaignStatus, CampaignStatusKind, CampaignStatuses};
