//! 投递工作者
//!
//! 消费持久队列中的投递任务，驱动消息状态机：抢占 -> 抑制判定 ->
//! 渲染 -> 发送，瞬时失败按指数退避重新排队。二进制入口在 main.rs。

pub mod error;
pub mod process;
pub mod templates;
pub mod transport;
pub mod worker;

pub use error::DeliveryError;
pub use process::{DeliveryProcessor, ProcessOutcome};
pub use templates::{RenderedEmail, StaticTemplateStore, Template, TemplateStore};
pub use transport::{LogTransport, SmtpTransport, Transport};
pub use worker::DeliveryWorkerPool;
