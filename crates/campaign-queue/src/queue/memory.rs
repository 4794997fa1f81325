//! 内存队列后端
//!
//! 供工作者测试与本地验证使用的 `JobSource` 实现，不依赖外部存储。
//! 通过显式传入"当前时间"的领取接口，测试可以直接推进退避计划
//! 而无需真实等待。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use courier_shared::error::Result;

use super::{Delivery, JobSource, LeasedJob};

#[derive(Debug, Clone)]
struct JobRow {
    id: i64,
    delivery: Delivery,
    attempts: u32,
    active_at: DateTime<Utc>,
    leased: bool,
}

/// 内存任务队列
#[derive(Clone, Default)]
pub struct MemoryQueue {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<i64, JobRow>,
    next_id: i64,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接入队（测试场景没有事务语义可言）
    pub fn enqueue(&self, deliveries: &[Delivery]) {
        let mut inner = self.inner.lock();
        for delivery in deliveries {
            inner.next_id += 1;
            let id = inner.next_id;
            inner.jobs.insert(
                id,
                JobRow {
                    id,
                    delivery: delivery.clone(),
                    attempts: 0,
                    active_at: Utc::now(),
                    leased: false,
                },
            );
        }
    }

    /// 以指定时间为"现在"领取任务
    ///
    /// 测试可以传入未来时间立刻领到退避中的任务，无需 sleep。
    pub fn dequeue_at(&self, now: DateTime<Utc>) -> Option<LeasedJob> {
        let mut inner = self.inner.lock();

        let candidate = inner
            .jobs
            .values()
            .filter(|j| !j.leased && j.active_at <= now)
            .map(|j| j.id)
            .min()?;

        let job = inner.jobs.get_mut(&candidate)?;
        job.leased = true;

        Some(LeasedJob {
            id: job.id,
            delivery: job.delivery.clone(),
            attempts: job.attempts,
        })
    }

    /// 队列中剩余任务数（含租用中与退避中的任务）
    pub fn len(&self) -> usize {
        self.inner.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl JobSource for MemoryQueue {
    async fn dequeue(&self) -> Result<Option<LeasedJob>> {
        Ok(self.dequeue_at(Utc::now()))
    }

    async fn complete(&self, job: &LeasedJob) -> Result<()> {
        self.inner.lock().jobs.remove(&job.id);
        Ok(())
    }

    async fn retry(&self, job: &LeasedJob, delay: Duration) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(row) = inner.jobs.get_mut(&job.id) {
            row.attempts += 1;
            row.active_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
            row.leased = false;
        }
        Ok(())
    }
}
