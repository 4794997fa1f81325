//! 邮件模板存取与渲染
//!
//! 模板存储通过 trait 注入，工作者不依赖任何全局单例，
//! 测试时可以替换为内存实现。

use std::collections::HashMap;

use async_trait::async_trait;
use courier_queue::Delivery;

use crate::error::DeliveryError;

/// 默认模板标识，活动未指定模板时使用
pub const DEFAULT_TEMPLATE_ID: &str = "default";

/// 邮件模板
///
/// 主题与正文支持 `{{placeholder}}` 占位符，渲染时以投递载荷字段替换。
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub id: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// 渲染完成、可直接交给传输层发送的邮件
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// 模板存储
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// 按标识查找模板，不存在返回 [`DeliveryError::TemplateNotFound`]
    async fn get(&self, template_id: &str) -> Result<Template, DeliveryError>;
}

/// 内存模板存储
///
/// 预置一个 `default` 模板，可通过 [`StaticTemplateStore::insert`] 补充。
pub struct StaticTemplateStore {
    templates: HashMap<String, Template>,
}

impl StaticTemplateStore {
    pub fn new() -> Self {
        let mut templates = HashMap::new();
        templates.insert(
            DEFAULT_TEMPLATE_ID.to_string(),
            Template {
                id: DEFAULT_TEMPLATE_ID.to_string(),
                subject: "来自 {{organization}} 的通知".to_string(),
                text: "{{endorsement}}\n\n空间: {{space}}\n组织: {{organization}}".to_string(),
                html: "<p>{{endorsement}}</p><p>空间: {{space}}</p><p>组织: {{organization}}</p>"
                    .to_string(),
            },
        );
        Self { templates }
    }

    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.id.clone(), template);
    }
}

impl Default for StaticTemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TemplateStore for StaticTemplateStore {
    async fn get(&self, template_id: &str) -> Result<Template, DeliveryError> {
        self.templates
            .get(template_id)
            .cloned()
            .ok_or_else(|| DeliveryError::TemplateNotFound {
                template_id: template_id.to_string(),
            })
    }
}

/// 用投递载荷渲染模板
///
/// 占位符逐项字符串替换，未出现的占位符原样保留。
pub fn render(template: &Template, delivery: &Delivery) -> RenderedEmail {
    RenderedEmail {
        subject: substitute(&template.subject, delivery),
        text: substitute(&template.text, delivery),
        html: substitute(&template.html, delivery),
    }
}

fn substitute(input: &str, delivery: &Delivery) -> String {
    input
        .replace("{{endorsement}}", &delivery.options.endorsement)
        .replace("{{user_guid}}", &delivery.user_guid)
        .replace("{{email}}", &delivery.email)
        .replace("{{space}}", &delivery.space.name)
        .replace("{{organization}}", &delivery.organization.name)
        .replace("{{campaign_id}}", &delivery.campaign_id)
}
