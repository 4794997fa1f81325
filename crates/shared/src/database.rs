//! 数据库连接管理
//!
//! 消息表与任务队列同库存储，整个投递管道共用这里建出的连接池。
//! 迁移在服务启动时由本模块执行，保证工作者起来之前表结构就绪。

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::Result;

/// 投递管道的数据库句柄
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 按配置建立连接池
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "数据库连接池已建立"
        );

        Ok(Self { pool })
    }

    /// 执行待应用的迁移
    ///
    /// 幂等：已应用过的迁移会被跳过。消息表、任务队列表与退订相关
    /// 表都在同一组迁移中，任何服务入口启动时调用一次即可。
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("数据库迁移已就绪");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 连通性探测，供启动自检与健康检查端点使用
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// 优雅停机时排空并关闭连接池
    pub async fn close(&self) {
        self.pool.close().await;
        info!("数据库连接池已关闭");
    }
}
