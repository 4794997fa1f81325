//! Postgres 集成测试
//!
//! 覆盖入队事务的原子性、队列租约语义与凭据批量累加。
//! 需要本地数据库并已执行迁移，默认跳过：
//! `cargo test -p courier-queue -- --ignored`

use std::time::Duration;

use chrono::Utc;
use courier_queue::queue::JobSource;
use courier_queue::repository::{MessagesRepository, ReceiptsRepository};
use courier_queue::{
    Audience, EnqueueContext, JobEnqueuer, MessageStatus, Organization, PgQueue, Recipient, Space,
};
use courier_shared::config::DatabaseConfig;
use courier_shared::database::Database;
use sqlx::postgres::PgPool;
use uuid::Uuid;

async fn test_pool() -> PgPool {
    let db = Database::connect(&DatabaseConfig::default())
        .await
        .expect("连接测试数据库失败");
    db.pool().clone()
}

fn sample_context(campaign_id: &str) -> EnqueueContext {
    EnqueueContext {
        space: Space {
            guid: "space-guid".to_string(),
            name: "the-space".to_string(),
        },
        organization: Organization {
            guid: "org-guid".to_string(),
            name: "the-org".to_string(),
        },
        client_id: "the-client".to_string(),
        uaa_host: "uaa.example.com".to_string(),
        scope: "notifications.write".to_string(),
        vcap_request_id: "req-1".to_string(),
        request_received: Utc::now(),
        campaign_id: campaign_id.to_string(),
        campaign_type_id: "type-1".to_string(),
        template_id: "default".to_string(),
    }
}

fn recipients(n: usize) -> Vec<Recipient> {
    (0..n)
        .map(|i| Recipient {
            user_guid: format!("user-{i}"),
            email: format!("user-{i}@example.com"),
            endorsement: "订阅了产品更新".to_string(),
        })
        .collect()
}

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_enqueue_creates_messages_and_jobs_atomically() {
    let pool = test_pool().await;
    let queue = PgQueue::new(pool.clone(), Duration::from_secs(60));
    let messages = MessagesRepository::new(pool.clone());
    let enqueuer = JobEnqueuer::new(pool.clone(), queue, messages.clone());

    let campaign_id = Uuid::new_v4().to_string();
    let created = enqueuer
        .enqueue(&recipients(4), &sample_context(&campaign_id))
        .await
        .unwrap();

    assert_eq!(created.len(), 4);
    for message in &created {
        assert_eq!(message.status, MessageStatus::Queued);
        let found = messages.find_by_id(&message.id).await.unwrap();
        assert_eq!(found.campaign_id, campaign_id);
    }

    // 对应的任务也在同一事务中落库
    let job_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM delivery_jobs WHERE payload->>'campaignId' = $1",
    )
    .bind(&campaign_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(job_count, 4);
}

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_rolled_back_batch_leaves_nothing_visible() {
    let pool = test_pool().await;
    let queue = PgQueue::new(pool.clone(), Duration::from_secs(60));
    let messages = MessagesRepository::new(pool.clone());

    let campaign_id = Uuid::new_v4().to_string();
    let context = sample_context(&campaign_id);

    // 手动驱动入队器使用的同一套事务写入，再整体回滚
    let mut tx = pool.begin().await.unwrap();
    let mut deliveries = Vec::new();
    for recipient in recipients(4) {
        let message = courier_queue::Message::new(&campaign_id);
        messages.insert_in(&mut tx, &message).await.unwrap();
        deliveries.push(courier_queue::enqueuer::build_delivery(
            &recipient,
            &message.id,
            &context,
        ));
    }
    queue.enqueue_in(&mut tx, &deliveries).await.unwrap();
    tx.rollback().await.unwrap();

    // 消息行与任务行都不可见——没有半入队的活动
    let message_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE campaign_id = $1")
            .bind(&campaign_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    let job_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM delivery_jobs WHERE payload->>'campaignId' = $1",
    )
    .bind(&campaign_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(message_count, 0);
    assert_eq!(job_count, 0);
}

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_dequeue_leases_job_exactly_once() {
    let pool = test_pool().await;
    let queue = PgQueue::new(pool.clone(), Duration::from_secs(60));
    let messages = MessagesRepository::new(pool.clone());
    let enqueuer = JobEnqueuer::new(pool.clone(), queue, messages);

    let campaign_id = Uuid::new_v4().to_string();
    enqueuer
        .enqueue(&recipients(1), &sample_context(&campaign_id))
        .await
        .unwrap();

    // 租约期内同一任务不会被第二个消费者领走
    let queue = PgQueue::new(pool.clone(), Duration::from_secs(60));
    let mut leased = None;
    while let Some(job) = queue.dequeue().await.unwrap() {
        if job.delivery.campaign_id == campaign_id {
            leased = Some(job);
            break;
        }
        queue.complete(&job).await.unwrap();
    }
    let job = leased.expect("应领取到刚入队的任务");
    assert_eq!(job.attempts, 0);

    queue.complete(&job).await.unwrap();
    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM delivery_jobs WHERE id = $1")
        .bind(job.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_retry_defers_job_and_increments_attempts() {
    let pool = test_pool().await;
    let queue = PgQueue::new(pool.clone(), Duration::from_secs(60));
    let messages = MessagesRepository::new(pool.clone());
    let enqueuer = JobEnqueuer::new(pool.clone(), queue, messages);

    let campaign_id = Uuid::new_v4().to_string();
    enqueuer
        .enqueue(&recipients(1), &sample_context(&campaign_id))
        .await
        .unwrap();

    let queue = PgQueue::new(pool.clone(), Duration::from_secs(60));
    let mut leased = None;
    while let Some(job) = queue.dequeue().await.unwrap() {
        if job.delivery.campaign_id == campaign_id {
            leased = Some(job);
            break;
        }
        queue.complete(&job).await.unwrap();
    }
    let job = leased.expect("应领取到刚入队的任务");

    queue.retry(&job, Duration::from_secs(3600)).await.unwrap();

    let attempts: i32 = sqlx::query_scalar("SELECT attempts FROM delivery_jobs WHERE id = $1")
        .bind(job.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(attempts, 1);

    // 延迟一小时，短期内不会再被领取
    let active: bool = sqlx::query_scalar(
        "SELECT active_at > now() + interval '30 minutes' FROM delivery_jobs WHERE id = $1",
    )
    .bind(job.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(active);
}

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_batch_receipts_upsert_counts() {
    let pool = test_pool().await;
    let receipts = ReceiptsRepository::new(pool.clone());

    let client_id = Uuid::new_v4().to_string();
    let guids = vec!["user-a".to_string(), "user-b".to_string()];

    receipts
        .create_receipts(&guids, &client_id, "kind-1")
        .await
        .unwrap();
    // 第二批与第一批重叠：同组合累加而非新增行
    receipts
        .create_receipts(&guids[..1], &client_id, "kind-1")
        .await
        .unwrap();

    let a = receipts.find("user-a", &client_id, "kind-1").await.unwrap();
    let b = receipts.find("user-b", &client_id, "kind-1").await.unwrap();
    assert_eq!(a.count, 2);
    assert_eq!(b.count, 1);
}

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_message_retention_cleanup() {
    let pool = test_pool().await;
    let messages = MessagesRepository::new(pool.clone());

    // 未来时间之前的全部清掉后，刚插入的行不应存活
    let mut tx = pool.begin().await.unwrap();
    let message = courier_queue::Message::new(&Uuid::new_v4().to_string());
    messages.insert_in(&mut tx, &message).await.unwrap();
    tx.commit().await.unwrap();

    let deleted = messages
        .delete_before(Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap();
    assert!(deleted >= 1);

    let err = messages.find_by_id(&message.id).await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_critical_campaign_type_cannot_be_unsubscribed() {
    let pool = test_pool().await;
    let unsubscribes = courier_queue::repository::UnsubscribesRepository::new(pool.clone());

    let type_id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO campaign_types (id, name, critical) VALUES ($1, 'platform-alerts', TRUE)")
        .bind(&type_id)
        .execute(&pool)
        .await
        .unwrap();

    let err = unsubscribes
        .unsubscribe(&type_id, "user-1")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "FORBIDDEN");
}

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_critical_campaign_type_bypasses_existing_unsubscribe() {
    use courier_queue::repository::SuppressionStore;

    let pool = test_pool().await;
    let unsubscribes = courier_queue::repository::UnsubscribesRepository::new(pool.clone());

    let type_id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO campaign_types (id, name, critical) VALUES ($1, 'platform-alerts', TRUE)")
        .bind(&type_id)
        .execute(&pool)
        .await
        .unwrap();
    // 旧退订记录（类型升级为 critical 之前留下的）也不生效
    sqlx::query("INSERT INTO unsubscribes (campaign_type_id, user_guid) VALUES ($1, 'user-1')")
        .bind(&type_id)
        .execute(&pool)
        .await
        .unwrap();

    assert!(!unsubscribes.is_suppressed(&type_id, "user-1").await.unwrap());
}

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_non_critical_unsubscribe_suppresses() {
    use courier_queue::repository::SuppressionStore;

    let pool = test_pool().await;
    let unsubscribes = courier_queue::repository::UnsubscribesRepository::new(pool.clone());

    let type_id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO campaign_types (id, name, critical) VALUES ($1, 'product-updates', FALSE)")
        .bind(&type_id)
        .execute(&pool)
        .await
        .unwrap();

    assert!(!unsubscribes.is_suppressed(&type_id, "user-1").await.unwrap());

    unsubscribes.unsubscribe(&type_id, "user-1").await.unwrap();
    // 重复退订是无操作
    unsubscribes.unsubscribe(&type_id, "user-1").await.unwrap();
    assert!(unsubscribes.is_suppressed(&type_id, "user-1").await.unwrap());

    unsubscribes.resubscribe(&type_id, "user-1").await.unwrap();
    assert!(!unsubscribes.is_suppressed(&type_id, "user-1").await.unwrap());
}

// Audience 解析留给上层调用方；此处仅验证类型可用
#[test]
fn test_audience_variants_exposed() {
    let _user = Audience::User("user-1".to_string());
    let _space = Audience::Space("space-guid".to_string());
}
