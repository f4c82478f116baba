//! 通知扇出
//!
//! - [`routing`]: 固定的事件 → 接收者路由表
//! - [`fanout`]: 有界队列 + 后台投递工作者

pub mod fanout;
pub mod routing;

pub use fanout::{NotificationFanout, NotificationTransport, NotificationWorker};
pub use routing::{Recipient, recipients, resolve_channels};
