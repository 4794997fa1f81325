//! 仓储层
//!
//! 每张表一个仓储结构体，持有连接池；工作者侧的依赖通过
//! `traits` 中的接口注入。

pub mod campaign_types;
pub mod messages;
pub mod receipts;
pub mod traits;
pub mod unsubscribes;

pub use campaign_types::CampaignTypesRepository;
pub use messages::{CampaignRollup, MessagesRepository};
pub use receipts::ReceiptsRepository;
pub use traits::{MessageStore, SuppressionStore};
pub use unsubscribes::UnsubscribesRepository;
