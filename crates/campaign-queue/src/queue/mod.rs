//! 持久化投递任务队列
//!
//! 队列后端通过 `JobSource` trait 抽象，生产环境使用与消息表同库的
//! Postgres 实现（入队可与消息插入共享同一事务），测试使用内存实现。

use std::time::Duration;

use async_trait::async_trait;
use courier_shared::error::Result;

pub mod delivery;
pub mod memory;
pub mod pg;

pub use delivery::{Delivery, DeliveryOptions, JOB_TYPE_V2};
pub use memory::MemoryQueue;
pub use pg::PgQueue;

/// 已领取的队列任务
///
/// 队列保证同一任务同一时刻只被一个工作者持有（租约语义）。
/// `attempts` 是此前已失败的投递轮次，供重试预算判断使用。
#[derive(Debug, Clone)]
pub struct LeasedJob {
    pub id: i64,
    pub delivery: Delivery,
    pub attempts: u32,
}

/// 队列消费端抽象
///
/// 工作者只依赖该 trait：领取、完成、按延迟重新排队。
/// 入队不在此 trait 中——入队必须与消息插入共享数据库事务，
/// 是 Postgres 后端特有的能力（见 `PgQueue::enqueue_in`）。
#[async_trait]
pub trait JobSource: Send + Sync {
    /// 领取一个到期任务；队列为空时返回 None，由调用方决定轮询节奏
    async fn dequeue(&self) -> Result<Option<LeasedJob>>;

    /// 确认任务已处理完毕（投递成功、跳过或永久失败），从队列移除
    async fn complete(&self, job: &LeasedJob) -> Result<()>;

    /// 任务瞬时失败，按给定延迟重新排队并累加尝试计数
    async fn retry(&self, job: &LeasedJob, delay: Duration) -> Result<()>;
}
