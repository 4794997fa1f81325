//! 任务入队器
//!
//! 把一批已解析的收件人原子地转化为 N 条消息记录 + N 个队列任务。
//! 整批共用一个数据库事务：任一消息插入或任务提交失败都回滚全部，
//! 工作者永远不会观察到只入队了一半的活动。

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use tracing::{error, info};

use courier_shared::error::{CourierError, Result};

use crate::models::{Message, Organization, Recipient, Space};
use crate::queue::{Delivery, DeliveryOptions, JOB_TYPE_V2, PgQueue};
use crate::repository::MessagesRepository;

/// 一次入队调用的活动级上下文
///
/// 批内所有收件人共享；收件人级的个性化（endorsement）来自
/// `Recipient` 本身。
#[derive(Debug, Clone)]
pub struct EnqueueContext {
    pub space: Space,
    pub organization: Organization,
    pub client_id: String,
    pub uaa_host: String,
    pub scope: String,
    pub vcap_request_id: String,
    /// 原始入站请求的接收时间（UTC）
    pub request_received: DateTime<Utc>,
    pub campaign_id: String,
    pub campaign_type_id: String,
    pub template_id: String,
}

/// 任务入队器
#[derive(Clone)]
pub struct JobEnqueuer {
    pool: PgPool,
    queue: PgQueue,
    messages: MessagesRepository,
}

impl JobEnqueuer {
    pub fn new(pool: PgPool, queue: PgQueue, messages: MessagesRepository) -> Self {
        Self {
            pool,
            queue,
            messages,
        }
    }

    /// 原子入队一批收件人
    ///
    /// 成功时返回新建的消息记录（均为 queued 状态），数量与收件人一致。
    /// 任一步骤失败都回滚整个事务并以单个 Enqueue 错误上抛——没有部分
    /// 成功报告。提交本身失败时事务已被驱动结束，不再调用回滚，
    /// 也不做补偿清理，直接作为致命入队失败上抛。
    pub async fn enqueue(
        &self,
        recipients: &[Recipient],
        context: &EnqueueContext,
    ) -> Result<Vec<Message>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CourierError::Enqueue(format!("开启事务失败: {e}")))?;

        let mut messages = Vec::with_capacity(recipients.len());
        let mut deliveries = Vec::with_capacity(recipients.len());

        for recipient in recipients {
            let message = Message::new(&context.campaign_id);

            if let Err(e) = self.messages.insert_in(&mut tx, &message).await {
                error!(
                    campaign_id = %context.campaign_id,
                    user_guid = %recipient.user_guid,
                    error = %e,
                    "消息插入失败，回滚整批入队"
                );
                let _ = tx.rollback().await;
                return Err(CourierError::Enqueue(format!("消息插入失败: {e}")));
            }

            deliveries.push(build_delivery(recipient, &message.id, context));
            messages.push(message);
        }

        // 任务提交与消息插入共享同一事务，先于提交执行
        if let Err(e) = self.queue.enqueue_in(&mut tx, &deliveries).await {
            error!(
                campaign_id = %context.campaign_id,
                error = %e,
                "任务提交失败，回滚整批入队"
            );
            let _ = tx.rollback().await;
            return Err(CourierError::Enqueue(format!("任务提交失败: {e}")));
        }

        tx.commit()
            .await
            .map_err(|e| CourierError::Enqueue(format!("事务提交失败: {e}")))?;

        info!(
            campaign_id = %context.campaign_id,
            recipients = recipients.len(),
            "活动已入队"
        );

        Ok(messages)
    }
}

/// 由收件人、消息 ID 和活动上下文构造任务载荷
///
/// 独立于事务逻辑的纯函数，载荷字段的正确性在无数据库的单元测试中验证。
pub fn build_delivery(recipient: &Recipient, message_id: &str, context: &EnqueueContext) -> Delivery {
    Delivery {
        job_type: JOB_TYPE_V2.to_string(),
        options: DeliveryOptions {
            endorsement: recipient.endorsement.clone(),
        },
        user_guid: recipient.user_guid.clone(),
        email: recipient.email.clone(),
        space: context.space.clone(),
        organization: context.organization.clone(),
        client_id: context.client_id.clone(),
        message_id: message_id.to_string(),
        uaa_host: context.uaa_host.clone(),
        scope: context.scope.clone(),
        vcap_request_id: context.vcap_request_id.clone(),
        request_received: context.request_received,
        campaign_id: context.campaign_id.clone(),
        campaign_type_id: context.campaign_type_id.clone(),
        template_id: context.template_id.clone(),
    }
}
