//! Postgres 队列后端
//!
//! 任务与消息记录同库存储，入队因此可以与消息插入共享同一事务，
//! 实现"N 条消息 + N 个任务"的全有或全无提交。出队使用
//! `FOR UPDATE SKIP LOCKED` 加租约时限：在途任务不会被二次派发，
//! 持有者崩溃后租约到期自动回到可领取状态。

use std::time::Duration;

use sqlx::postgres::{PgPool, Postgres};
use sqlx::{Row, Transaction};
use tracing::{debug, warn};

use courier_shared::error::{CourierError, Result};

use super::{Delivery, JobSource, LeasedJob};

/// Postgres 任务队列
#[derive(Clone)]
pub struct PgQueue {
    pool: PgPool,
    /// 领取后的租约时长，超时未确认视为持有者失联
    lease: Duration,
}

impl PgQueue {
    pub fn new(pool: PgPool, lease: Duration) -> Self {
        Self { pool, lease }
    }

    /// 在调用方的事务中批量提交任务
    ///
    /// 不触碰连接池——所有插入走传入的事务句柄，调用方（入队器）
    /// 决定提交或回滚，任务在事务提交前对工作者不可见。
    pub async fn enqueue_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        deliveries: &[Delivery],
    ) -> Result<()> {
        for delivery in deliveries {
            let payload = serde_json::to_value(delivery)
                .map_err(|e| CourierError::Queue(format!("任务载荷序列化失败: {e}")))?;

            sqlx::query(
                r#"
                INSERT INTO delivery_jobs (payload, attempts, active_at, created_at)
                VALUES ($1, 0, now(), now())
                "#,
            )
            .bind(payload)
            .execute(&mut **tx)
            .await?;
        }

        debug!(jobs = deliveries.len(), "投递任务已写入队列（随事务提交生效）");
        Ok(())
    }
}

#[async_trait::async_trait]
impl JobSource for PgQueue {
    async fn dequeue(&self) -> Result<Option<LeasedJob>> {
        // 子查询挑选一个到期且未被租用的任务，SKIP LOCKED 避免
        // 多个工作者争抢同一行时互相阻塞
        let row = sqlx::query(
            r#"
            UPDATE delivery_jobs
            SET reserved_until = now() + make_interval(secs => $1)
            WHERE id = (
                SELECT id FROM delivery_jobs
                WHERE active_at <= now()
                  AND (reserved_until IS NULL OR reserved_until < now())
                ORDER BY id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, payload, attempts
            "#,
        )
        .bind(self.lease.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: i64 = row.try_get("id")?;
        let payload: serde_json::Value = row.try_get("payload")?;
        let attempts: i32 = row.try_get("attempts")?;

        let delivery: Delivery = serde_json::from_value(payload).map_err(|e| {
            warn!(job_id = id, error = %e, "任务载荷反序列化失败");
            CourierError::Queue(format!("任务 {id} 载荷反序列化失败: {e}"))
        })?;

        Ok(Some(LeasedJob {
            id,
            delivery,
            attempts: attempts as u32,
        }))
    }

    async fn complete(&self, job: &LeasedJob) -> Result<()> {
        sqlx::query("DELETE FROM delivery_jobs WHERE id = $1")
            .bind(job.id)
            .execute(&self.pool)
            .await?;

        debug!(job_id = job.id, message_id = %job.delivery.message_id, "任务已确认完成");
        Ok(())
    }

    async fn retry(&self, job: &LeasedJob, delay: Duration) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE delivery_jobs
            SET attempts = attempts + 1,
                active_at = now() + make_interval(secs => $2),
                reserved_until = NULL
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(delay.as_secs_f64())
        .execute(&self.pool)
        .await?;

        debug!(
            job_id = job.id,
            message_id = %job.delivery.message_id,
            attempts = job.attempts + 1,
            delay_ms = delay.as_millis() as u64,
            "任务已重新排队"
        );
        Ok(())
    }
}
