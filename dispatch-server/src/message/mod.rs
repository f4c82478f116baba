//! 进程内消息总线
//!
//! 通知扇出的默认传输层：基于 tokio broadcast，订阅者按频道键过滤。

pub mod bus;

pub use bus::{ChannelSubscriber, MessageBus};
pub use shared::message::{BusMessage, DispatchEventKind, NotificationPayload};
