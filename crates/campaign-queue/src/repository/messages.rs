//! 消息仓储
//!
//! 提供消息记录的创建、查找、守卫式状态写入、按活动汇总和保留期清理。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, Postgres};
use sqlx::Transaction;

use courier_shared::error::{CourierError, Result};

use super::traits::MessageStore;
use crate::models::{Message, MessageStatus};

/// 按活动汇总的消息状态统计
///
/// 状态聚合器的原始输入，一次分组查询得出。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampaignRollup {
    pub queued: i64,
    pub delivering: i64,
    pub retrying: i64,
    pub delivered: i64,
    pub skipped: i64,
    pub failed: i64,
    /// 最早一次状态写入时间（入队即为消息首次写入）
    pub first_updated_at: Option<DateTime<Utc>>,
    /// 最近一次状态写入时间
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl CampaignRollup {
    pub fn total(&self) -> i64 {
        self.queued + self.delivering + self.retrying + self.delivered + self.skipped + self.failed
    }

    /// 仍在途的消息数（尚未进入终态）
    pub fn pending(&self) -> i64 {
        self.queued + self.delivering + self.retrying
    }
}

/// 消息仓储
#[derive(Clone)]
pub struct MessagesRepository {
    pool: PgPool,
}

impl MessagesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 在调用方事务中插入一条消息
    ///
    /// 入队器专用：与任务提交共享同一事务，事务回滚时插入一并消失。
    pub async fn insert_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        message: &Message,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, campaign_id, status, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&message.id)
        .bind(&message.campaign_id)
        .bind(message.status)
        .bind(message.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| match CourierError::from(e) {
            CourierError::DuplicateRecord { .. } => CourierError::DuplicateRecord {
                entity: "Message".to_string(),
                key: message.id.clone(),
            },
            other => other,
        })?;

        Ok(())
    }

    /// 按 ID 查找消息
    pub async fn find_by_id(&self, id: &str) -> Result<Message> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, campaign_id, status, updated_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        message.ok_or_else(|| CourierError::NotFound {
            entity: "Message".to_string(),
            id: id.to_string(),
        })
    }

    /// 按活动 ID 汇总各状态的消息数与时间范围
    ///
    /// 活动不存在（没有任何消息行引用该 ID）时返回 None，
    /// 由状态聚合器转换为 NotFound。
    pub async fn campaign_rollup(&self, campaign_id: &str) -> Result<Option<CampaignRollup>> {
        let rows = sqlx::query_as::<_, (MessageStatus, i64, DateTime<Utc>, DateTime<Utc>)>(
            r#"
            SELECT status, COUNT(*), MIN(updated_at), MAX(updated_at)
            FROM messages
            WHERE campaign_id = $1
            GROUP BY status
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut rollup = CampaignRollup::default();
        for (status, count, first, last) in rows {
            match status {
                MessageStatus::Queued => rollup.queued = count,
                MessageStatus::Delivering => rollup.delivering = count,
                MessageStatus::Retrying => rollup.retrying = count,
                MessageStatus::Delivered => rollup.delivered = count,
                MessageStatus::Skipped => rollup.skipped = count,
                MessageStatus::Failed => rollup.failed = count,
            }
            rollup.first_updated_at = match rollup.first_updated_at {
                Some(t) => Some(t.min(first)),
                None => Some(first),
            };
            rollup.last_updated_at = match rollup.last_updated_at {
                Some(t) => Some(t.max(last)),
                None => Some(last),
            };
        }

        Ok(Some(rollup))
    }

    /// 保留期清理：删除 updated_at 早于截止时间的消息，返回删除行数
    pub async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE updated_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl MessageStore for MessagesRepository {
    async fn transition(&self, message_id: &str, to: MessageStatus) -> Result<bool> {
        // 终态行不匹配 WHERE 条件，重复派发自然退化为无操作；
        // 单行写入由队列的单持有者语义串行化
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET status = $2, updated_at = now()
            WHERE id = $1
              AND status NOT IN ('delivered', 'skipped', 'failed')
            "#,
        )
        .bind(message_id)
        .bind(to)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
