//! 活动类型仓储
//!
//! 活动类型的 CRUD 属于外围 Web 面，不在本仓库范围内；
//! 这里只提供投递管道需要的只读访问（criticality 标志）。

use sqlx::postgres::PgPool;

use courier_shared::error::{CourierError, Result};

use crate::models::CampaignType;

/// 活动类型仓储
#[derive(Clone)]
pub struct CampaignTypesRepository {
    pool: PgPool,
}

impl CampaignTypesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 按 ID 查找活动类型
    pub async fn find(&self, id: &str) -> Result<CampaignType> {
        let campaign_type = sqlx::query_as::<_, CampaignType>(
            r#"
            SELECT id, name, critical
            FROM campaign_types
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        campaign_type.ok_or_else(|| CourierError::NotFound {
            entity: "CampaignType".to_string(),
            id: id.to_string(),
        })
    }

    /// 活动类型是否为关键类型
    pub async fn is_critical(&self, id: &str) -> Result<bool> {
        Ok(self.find(id).await?.critical)
    }
}
