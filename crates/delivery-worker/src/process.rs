//! 单条投递任务的执行流程
//!
//! 每个任务对应一条消息记录。流程：先把消息原子推进到 delivering
//! （失败说明消息已处于终态，任务按重复投递确认掉），再做退订抑制
//! 判定，然后渲染模板并发送。瞬时失败按退避策略重新排队，
//! 永久失败与重试耗尽都落到 failed。

use std::sync::Arc;
use std::time::Duration;

use courier_queue::repository::{MessageStore, SuppressionStore};
use courier_queue::{LeasedJob, MessageStatus};
use courier_shared::error::CourierError;
use courier_shared::retry::RetryPolicy;
use tracing::{info, warn};

use crate::templates::{TemplateStore, render};
use crate::transport::Transport;

/// 单条任务的处理结果，决定队列侧的收尾动作
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// 发送成功，任务确认
    Delivered,
    /// 收件人已退订，未发送，任务确认
    Skipped,
    /// 消息已处于终态（此前已投出或已失败），不重复发送，任务确认
    AlreadyFinal,
    /// 永久失败或重试耗尽，任务确认
    Failed,
    /// 瞬时失败，按给定延迟重新排队
    Retry(Duration),
}

/// 投递处理器
///
/// 依赖全部通过接口注入，处理器本身不持有连接池，
/// 便于在纯内存环境下覆盖完整状态机。
pub struct DeliveryProcessor {
    messages: Arc<dyn MessageStore>,
    suppression: Arc<dyn SuppressionStore>,
    templates: Arc<dyn TemplateStore>,
    transport: Arc<dyn Transport>,
    retry_policy: RetryPolicy,
}

impl DeliveryProcessor {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        suppression: Arc<dyn SuppressionStore>,
        templates: Arc<dyn TemplateStore>,
        transport: Arc<dyn Transport>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            messages,
            suppression,
            templates,
            transport,
            retry_policy,
        }
    }

    /// 处理一个已租约的任务
    ///
    /// 返回 Err 仅表示存储层故障，此时不写任何状态，
    /// 任务保持租约，到期后会被重新派发。
    pub async fn process(&self, job: &LeasedJob) -> Result<ProcessOutcome, CourierError> {
        let delivery = &job.delivery;
        let message_id = delivery.message_id.as_str();

        // 原子抢占：只有从非终态成功推进到 delivering 的工作者才继续，
        // 队列至少一次投递带来的重复在这里折叠为空操作
        if !self
            .messages
            .transition(message_id, MessageStatus::Delivering)
            .await?
        {
            info!(message_id, "消息已处于终态，跳过重复投递");
            return Ok(ProcessOutcome::AlreadyFinal);
        }

        if self
            .suppression
            .is_suppressed(&delivery.campaign_type_id, &delivery.user_guid)
            .await?
        {
            self.messages
                .transition(message_id, MessageStatus::Skipped)
                .await?;
            info!(
                message_id,
                user_guid = %delivery.user_guid,
                campaign_type_id = %delivery.campaign_type_id,
                "收件人已退订，消息跳过"
            );
            return Ok(ProcessOutcome::Skipped);
        }

        let email = match self.templates.get(&delivery.template_id).await {
            Ok(template) => render(&template, delivery),
            Err(e) => {
                warn!(message_id, template_id = %delivery.template_id, error = %e, "模板不可用，消息置为失败");
                self.messages
                    .transition(message_id, MessageStatus::Failed)
                    .await?;
                return Ok(ProcessOutcome::Failed);
            }
        };

        match self.transport.send(&email, &delivery.email).await {
            Ok(transport_message_id) => {
                self.messages
                    .transition(message_id, MessageStatus::Delivered)
                    .await?;
                info!(
                    message_id,
                    transport_message_id = %transport_message_id,
                    transport = self.transport.name(),
                    "消息投递成功"
                );
                Ok(ProcessOutcome::Delivered)
            }
            Err(e) if e.is_retryable() && self.retry_policy.should_retry(job.attempts) => {
                let delay = self.retry_policy.delay_for_attempt(job.attempts);
                self.messages
                    .transition(message_id, MessageStatus::Retrying)
                    .await?;
                warn!(
                    message_id,
                    attempts = job.attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "瞬时投递失败，任务延迟重排"
                );
                Ok(ProcessOutcome::Retry(delay))
            }
            Err(e) => {
                self.messages
                    .transition(message_id, MessageStatus::Failed)
                    .await?;
                warn!(
                    message_id,
                    attempts = job.attempts,
                    retryable = e.is_retryable(),
                    error = %e,
                    "投递失败，消息置为失败"
                );
                Ok(ProcessOutcome::Failed)
            }
        }
    }
}
