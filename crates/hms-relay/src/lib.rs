//! # HMS 实时事件中继
//!
//! 面向临床协作的实时通知：
//! - 客户端连接与房间（角色）成员管理
//! - 急诊呼叫：手术室管理员房间定向通知，其他在线客户端全局告警
//! - 手术室分配：全量广播，管理员房间额外收到完成信号
//! - 每个客户端独立的有界发送队列，慢客户端不会拖住发布方

pub mod events;
pub mod relay;

pub use events::{role_room, ClientCommand, ClientFrame, EventName, RelayEvent, RelayMessage};
pub use relay::{ClientConnection, ClientId, DeliveryReport, EventRelay, RelayConfig, RelayStats};
