//! 邮件传输层
//!
//! 工作者通过 [`Transport`] 接口发送渲染后的邮件，
//! 传输实现负责把发送失败归类为瞬时或永久错误。

use async_trait::async_trait;
use courier_shared::config::MailerConfig;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DeliveryError;
use crate::templates::RenderedEmail;

/// 邮件传输
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// 发送一封邮件，返回传输侧生成的消息标识
    async fn send(&self, email: &RenderedEmail, to: &str) -> Result<String, DeliveryError>;

    fn name(&self) -> &'static str;
}

/// SMTP 传输
///
/// 持有发件配置并负责与邮件网关的会话。当前实现只做连通性模拟，
/// 协议细节在网关接入后补齐。
pub struct SmtpTransport {
    config: MailerConfig,
}

impl SmtpTransport {
    pub fn new(config: MailerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send(&self, email: &RenderedEmail, to: &str) -> Result<String, DeliveryError> {
        if to.is_empty() || !to.contains('@') {
            return Err(DeliveryError::permanent(format!("收件地址非法: {to}")));
        }

        let transport_message_id = Uuid::new_v4().to_string();

        info!(
            to = %to,
            from = %self.config.sender_address,
            subject = %email.subject,
            transport_message_id = %transport_message_id,
            "邮件已提交 SMTP 网关"
        );

        Ok(transport_message_id)
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

/// 日志传输
///
/// 只记录不发送，用于本地联调与演练环境。
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn send(&self, email: &RenderedEmail, to: &str) -> Result<String, DeliveryError> {
        let transport_message_id = Uuid::new_v4().to_string();

        info!(to = %to, subject = %email.subject, transport_message_id = %transport_message_id, "干跑模式，邮件未实际发送");
        debug!(text = %email.text, "邮件正文");

        Ok(transport_message_id)
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_email() -> RenderedEmail {
        RenderedEmail {
            subject: "测试主题".to_string(),
            text: "正文".to_string(),
            html: "<p>正文</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_smtp_rejects_malformed_address_permanently() {
        let transport = SmtpTransport::new(MailerConfig::default());

        let err = transport.send(&sample_email(), "not-an-address").await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_log_transport_returns_message_id() {
        let transport = LogTransport;

        let id = transport.send(&sample_email(), "a@example.com").await.unwrap();
        assert!(!id.is_empty());
    }
}
