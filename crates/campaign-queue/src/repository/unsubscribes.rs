//! 退订仓储与退订过滤
//!
//! 记录 (campaign_type_id, user_guid) 退订对，并为投递工作者提供
//! 抑制判定。关键活动类型不可退订：创建退订记录被拒绝（Forbidden），
//! 投递时也不查询退订状态，直接判定为不抑制。

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use tracing::debug;

use courier_shared::error::{CourierError, Result};

use super::campaign_types::CampaignTypesRepository;
use super::traits::SuppressionStore;

/// 退订仓储
#[derive(Clone)]
pub struct UnsubscribesRepository {
    pool: PgPool,
    campaign_types: CampaignTypesRepository,
}

impl UnsubscribesRepository {
    pub fn new(pool: PgPool) -> Self {
        let campaign_types = CampaignTypesRepository::new(pool.clone());
        Self {
            pool,
            campaign_types,
        }
    }

    /// 创建退订记录
    ///
    /// 对关键活动类型报 Forbidden；重复退订是无操作而非错误。
    pub async fn unsubscribe(&self, campaign_type_id: &str, user_guid: &str) -> Result<()> {
        if self.campaign_types.is_critical(campaign_type_id).await? {
            return Err(CourierError::Forbidden {
                operation: format!("退订关键活动类型 {campaign_type_id}"),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO unsubscribes (campaign_type_id, user_guid)
            VALUES ($1, $2)
            ON CONFLICT (campaign_type_id, user_guid) DO NOTHING
            "#,
        )
        .bind(campaign_type_id)
        .bind(user_guid)
        .execute(&self.pool)
        .await?;

        debug!(campaign_type_id, user_guid, "已创建退订记录");
        Ok(())
    }

    /// 删除退订记录；记录不存在时同样视为成功
    pub async fn resubscribe(&self, campaign_type_id: &str, user_guid: &str) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM unsubscribes
            WHERE campaign_type_id = $1 AND user_guid = $2
            "#,
        )
        .bind(campaign_type_id)
        .bind(user_guid)
        .execute(&self.pool)
        .await?;

        debug!(campaign_type_id, user_guid, "已删除退订记录");
        Ok(())
    }

    /// 退订记录是否存在
    pub async fn exists(&self, campaign_type_id: &str, user_guid: &str) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM unsubscribes
                WHERE campaign_type_id = $1 AND user_guid = $2
            )
            "#,
        )
        .bind(campaign_type_id)
        .bind(user_guid)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

#[async_trait]
impl SuppressionStore for UnsubscribesRepository {
    async fn is_suppressed(&self, campaign_type_id: &str, user_guid: &str) -> Result<bool> {
        // 关键类型短路：不查询退订状态
        if self.campaign_types.is_critical(campaign_type_id).await? {
            return Ok(false);
        }

        self.exists(campaign_type_id, user_guid).await
    }
}
