//! 投递工作者池
//!
//! 固定数量的 tokio 任务并发消费队列，每个工作者独立轮询。
//! 收到停机信号后工作者完成手头任务即退出，不再领取新任务。

use std::sync::Arc;
use std::time::Duration;

use courier_queue::queue::{JobSource, LeasedJob};
use courier_shared::config::WorkerConfig;
use futures::future::join_all;
use tokio::sync::watch;
use tracing::{error, info};

use crate::process::{DeliveryProcessor, ProcessOutcome};

/// 投递工作者池
pub struct DeliveryWorkerPool {
    queue: Arc<dyn JobSource>,
    processor: Arc<DeliveryProcessor>,
    worker_count: usize,
    poll_interval: Duration,
}

impl DeliveryWorkerPool {
    pub fn new(
        queue: Arc<dyn JobSource>,
        processor: Arc<DeliveryProcessor>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            queue,
            processor,
            worker_count: config.count,
            poll_interval: config.poll_interval(),
        }
    }

    /// 启动全部工作者并运行至停机信号
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        info!(worker_count = self.worker_count, "投递工作者池启动");

        let mut handles = Vec::with_capacity(self.worker_count);
        for worker_id in 0..self.worker_count {
            let queue = Arc::clone(&self.queue);
            let processor = Arc::clone(&self.processor);
            let shutdown = shutdown.clone();
            let poll_interval = self.poll_interval;
            handles.push(tokio::spawn(async move {
                worker_loop(worker_id, queue, processor, poll_interval, shutdown).await;
            }));
        }

        for result in join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "工作者任务异常退出");
            }
        }

        info!("投递工作者池已停止");
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<dyn JobSource>,
    processor: Arc<DeliveryProcessor>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(worker_id, "工作者启动");

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                // 发送端被丢弃（changed 返回 Err）同样视为停机
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            result = queue.dequeue() => match result {
                Ok(Some(job)) => {
                    handle_job(&*queue, &processor, &job).await;
                }
                Ok(None) => {
                    // 队列为空，等一个轮询周期，期间仍响应停机
                    if idle_wait(&mut shutdown, poll_interval).await {
                        break;
                    }
                }
                Err(e) => {
                    error!(worker_id, error = %e, "领取任务失败");
                    if idle_wait(&mut shutdown, poll_interval).await {
                        break;
                    }
                }
            },
        }
    }

    info!(worker_id, "工作者退出");
}

/// 空闲等待，返回 true 表示期间收到了停机信号
async fn idle_wait(shutdown: &mut watch::Receiver<bool>, interval: Duration) -> bool {
    tokio::select! {
        biased;
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        _ = tokio::time::sleep(interval) => false,
    }
}

/// 按处理结果做队列收尾
///
/// 处理器返回 Err 表示存储层故障：不确认也不重排，
/// 任务保持租约，到期后由队列重新派发。
async fn handle_job(queue: &dyn JobSource, processor: &DeliveryProcessor, job: &LeasedJob) {
    match processor.process(job).await {
        Ok(ProcessOutcome::Retry(delay)) => {
            if let Err(e) = queue.retry(job, delay).await {
                error!(job_id = job.id, error = %e, "任务重排失败，等待租约到期");
            }
        }
        Ok(
            ProcessOutcome::Delivered
            | ProcessOutcome::Skipped
            | ProcessOutcome::AlreadyFinal
            | ProcessOutcome::Failed,
        ) => {
            if let Err(e) = queue.complete(job).await {
                error!(job_id = job.id, error = %e, "任务确认失败，等待租约到期");
            }
        }
        Err(e) => {
            error!(job_id = job.id, message_id = %job.delivery.message_id, error = %e, "任务处理失败，保持租约");
        }
    }
}
