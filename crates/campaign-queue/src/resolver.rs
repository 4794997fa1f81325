//! 收件人解析
//!
//! 把发送目标描述（邮箱列表 / 用户 / 空间 / 组织 / 全量）解析为具体
//! 收件人列表的工作由外部系统完成（目录服务、UAA 等），本 crate 只
//! 定义接口并提供一个固定列表实现供测试与本地验证使用。

use async_trait::async_trait;

use courier_shared::error::Result;

use crate::models::{Audience, Recipient};

/// 收件人解析器
///
/// 约定：返回的列表已按 GUID/邮箱去重。下游的批量记账与入队
/// 都依赖这一去重保证。
#[async_trait]
pub trait RecipientResolver: Send + Sync {
    async fn resolve(&self, audience: &Audience) -> Result<Vec<Recipient>>;
}

/// 固定列表解析器
///
/// 无论目标描述是什么都返回构造时给定的列表（已做 GUID 去重）。
pub struct StaticResolver {
    recipients: Vec<Recipient>,
}

impl StaticResolver {
    pub fn new(recipients: Vec<Recipient>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let recipients = recipients
            .into_iter()
            .filter(|r| seen.insert(r.user_guid.clone()))
            .collect();
        Self { recipients }
    }
}

#[async_trait]
impl RecipientResolver for StaticResolver {
    async fn resolve(&self, _audience: &Audience) -> Result<Vec<Recipient>> {
        Ok(self.recipients.clone())
    }
}
