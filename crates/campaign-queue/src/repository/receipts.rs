//! 凭据仓储
//!
//! 以 (user_guid, client_id, kind_id) 为唯一键的发送计数账本。
//! 批量路径是单条原子 upsert 语句：已存在的键计数加一而非报错，
//! 并发发送方即使目标键重叠也不会产生部分写入竞态。

use sqlx::postgres::PgPool;

use courier_shared::error::{CourierError, Result};

use crate::models::Receipt;

/// 凭据仓储
#[derive(Clone)]
pub struct ReceiptsRepository {
    pool: PgPool,
}

impl ReceiptsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 创建单条凭据，计数恒为 1
    ///
    /// 与批量路径不同：键已存在时报 DuplicateRecord，由调用方决定后续动作。
    pub async fn create(&self, user_guid: &str, client_id: &str, kind_id: &str) -> Result<Receipt> {
        let receipt = sqlx::query_as::<_, Receipt>(
            r#"
            INSERT INTO receipts (user_guid, client_id, kind_id, count, created_at)
            VALUES ($1, $2, $3, 1, now())
            RETURNING user_guid, client_id, kind_id, count, created_at
            "#,
        )
        .bind(user_guid)
        .bind(client_id)
        .bind(kind_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match CourierError::from(e) {
            CourierError::DuplicateRecord { .. } => CourierError::DuplicateRecord {
                entity: "Receipt".to_string(),
                key: format!("{user_guid}/{client_id}/{kind_id}"),
            },
            other => other,
        })?;

        Ok(receipt)
    }

    /// 按键查找凭据
    pub async fn find(&self, user_guid: &str, client_id: &str, kind_id: &str) -> Result<Receipt> {
        let receipt = sqlx::query_as::<_, Receipt>(
            r#"
            SELECT user_guid, client_id, kind_id, count, created_at
            FROM receipts
            WHERE user_guid = $1 AND client_id = $2 AND kind_id = $3
            "#,
        )
        .bind(user_guid)
        .bind(client_id)
        .bind(kind_id)
        .fetch_optional(&self.pool)
        .await?;

        receipt.ok_or_else(|| CourierError::NotFound {
            entity: "Receipt".to_string(),
            id: format!("{user_guid}/{client_id}/{kind_id}"),
        })
    }

    /// 原地修正计数，返回更新后的凭据
    pub async fn update(&self, receipt: &Receipt) -> Result<Receipt> {
        let result = sqlx::query(
            r#"
            UPDATE receipts
            SET count = $4
            WHERE user_guid = $1 AND client_id = $2 AND kind_id = $3
            "#,
        )
        .bind(&receipt.user_guid)
        .bind(&receipt.client_id)
        .bind(&receipt.kind_id)
        .bind(receipt.count)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CourierError::NotFound {
                entity: "Receipt".to_string(),
                id: format!(
                    "{}/{}/{}",
                    receipt.user_guid, receipt.client_id, receipt.kind_id
                ),
            });
        }

        self.find(&receipt.user_guid, &receipt.client_id, &receipt.kind_id)
            .await
    }

    /// 幂等的批量记账
    ///
    /// 整批 GUID 在一条语句中完成 upsert：新键插入 count=1，
    /// 已存在的键 count 加一。键列表由解析器保证去重——同一语句内
    /// 命中同一键两次会被 Postgres 拒绝。
    pub async fn create_receipts(
        &self,
        user_guids: &[String],
        client_id: &str,
        kind_id: &str,
    ) -> Result<()> {
        if user_guids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO receipts (user_guid, client_id, kind_id, count, created_at)
            SELECT guid, $2, $3, 1, now()
            FROM UNNEST($1::text[]) AS guid
            ON CONFLICT (user_guid, client_id, kind_id)
            DO UPDATE SET count = receipts.count + 1
            "#,
        )
        .bind(user_guids)
        .bind(client_id)
        .bind(kind_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
