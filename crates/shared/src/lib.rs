//! 共享库
//!
//! 包含投递服务各 crate 共用的配置、错误处理、数据库连接、
//! 重试策略和日志初始化等基础设施代码。

pub mod config;
pub mod database;
pub mod error;
pub mod observability;
pub mod retry;
