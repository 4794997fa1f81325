//! 投递工作者服务入口
//!
//! 连接数据库、执行迁移，然后启动工作者池消费持久队列，
//! Ctrl-C 触发优雅停机：工作者完成手头任务后退出。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use courier_queue::repository::{MessagesRepository, UnsubscribesRepository};
use courier_queue::{JobSource, PgQueue};
use courier_shared::config::AppConfig;
use courier_shared::database::Database;
use courier_shared::observability;
use courier_shared::retry::RetryPolicy;
use delivery_worker::process::DeliveryProcessor;
use delivery_worker::templates::StaticTemplateStore;
use delivery_worker::transport::SmtpTransport;
use delivery_worker::worker::DeliveryWorkerPool;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 统一加载配置：config/default.toml + COURIER_ 环境变量覆盖
    let config = AppConfig::load("delivery-worker").unwrap_or_else(|e| {
        eprintln!("加载配置失败，使用默认值: {e}");
        AppConfig::default()
    });

    observability::init_tracing(&config.service_name, &config.observability);

    info!("Starting delivery-worker...");
    info!(environment = %config.environment, "Configuration loaded");

    // 2. 数据库连接与迁移
    let db = Database::connect(&config.database).await?;
    db.migrate().await?;
    let pool = db.pool().clone();
    info!("Database connection established");

    // 3. 队列与仓储
    let queue: Arc<dyn JobSource> = Arc::new(PgQueue::new(
        pool.clone(),
        Duration::from_secs(config.worker.lease_seconds as u64),
    ));
    let messages = Arc::new(MessagesRepository::new(pool.clone()));
    let unsubscribes = Arc::new(UnsubscribesRepository::new(pool.clone()));

    // 4. 投递处理器
    let processor = Arc::new(DeliveryProcessor::new(
        messages,
        unsubscribes,
        Arc::new(StaticTemplateStore::new()),
        Arc::new(SmtpTransport::new(config.mailer.clone())),
        RetryPolicy::from_worker_config(&config.worker),
    ));

    // 5. 工作者池与停机信号
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pool_handle = tokio::spawn(
        DeliveryWorkerPool::new(queue, processor, &config.worker).run(shutdown_rx),
    );

    signal::ctrl_c().await?;
    warn!("收到停机信号，等待工作者完成当前任务");
    let _ = shutdown_tx.send(true);

    pool_handle.await?;
    db.close().await;
    info!("delivery-worker 已退出");

    Ok(())
}
